//! Stream Frame Decoder
//!
//! Turns raw fragments of the chat response body into typed [`Frame`]s.
//!
//! Network reads do not respect frame boundaries: one read may carry several
//! frames, half a frame, or half of a multi-byte character. The decoder keeps
//! two tails across calls, an incomplete UTF-8 sequence and an unterminated
//! line, and only interprets complete lines.
//!
//! Malformed payloads are dropped without surfacing an error so one bad frame
//! does not end the stream. Every drop is counted in [`DecoderStats`].
//!
//! A decoder serves exactly one turn. After the done sentinel or an error
//! frame it ignores all further input.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

use super::frame::{Frame, FramePayload, DATA_PREFIX, DONE_SENTINEL};

/// Counters describing what a decoder has seen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// `data:` lines seen
    pub frames: u64,
    /// Text events emitted
    pub text_events: u64,
    /// Payloads that failed to parse and were dropped
    pub dropped_frames: u64,
    /// Non-data lines (comments, `event:` fields, stray text)
    pub ignored_lines: u64,
}

impl DecoderStats {
    /// Add another decoder's counters
    pub fn merge(&mut self, other: &DecoderStats) {
        self.frames += other.frames;
        self.text_events += other.text_events;
        self.dropped_frames += other.dropped_frames;
        self.ignored_lines += other.ignored_lines;
    }
}

/// Incremental decoder for one response body
#[derive(Debug, Default)]
pub struct StreamFrameDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending_bytes: Vec<u8>,
    /// Text after the last newline
    line_buffer: String,
    /// Set after `[DONE]` or an error frame
    terminated: bool,
    stats: DecoderStats,
}

impl StreamFrameDecoder {
    /// Create a decoder for a new turn
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal frame has been decoded
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Counters so far
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one raw fragment; returns the frames it completed
    pub fn push(&mut self, fragment: &[u8]) -> Vec<Frame> {
        if self.terminated {
            return Vec::new();
        }
        let text = self.decode_utf8(fragment);
        self.line_buffer.push_str(&text);
        self.drain_lines()
    }

    /// Feed an already-decoded fragment
    pub fn push_str(&mut self, fragment: &str) -> Vec<Frame> {
        self.push(fragment.as_bytes())
    }

    /// Signal end of input; interprets a final unterminated line
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.terminated {
            return Vec::new();
        }
        if !self.pending_bytes.is_empty() {
            let tail = std::mem::take(&mut self.pending_bytes);
            self.line_buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let mut frames = self.drain_lines();
        if !self.terminated && !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.process_line(line.trim_end_matches('\r'), &mut frames);
        }
        frames
    }

    /// Decode as much of the byte tail as forms complete characters
    fn decode_utf8(&mut self, fragment: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(fragment);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match e.error_len() {
                        // Sequence cut off at the end of the fragment
                        None => {
                            rest = &rest[valid_up_to..];
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + len..];
                        }
                    }
                }
            }
        }
        self.pending_bytes = rest.to_vec();
        out
    }

    fn drain_lines(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut frames);
            if self.terminated {
                self.line_buffer.clear();
                self.pending_bytes.clear();
                break;
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        if line.is_empty() {
            return;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            self.stats.ignored_lines += 1;
            tracing::trace!(line = %line, "Ignoring non-data line");
            return;
        };
        self.stats.frames += 1;

        if payload == DONE_SENTINEL {
            self.terminated = true;
            frames.push(Frame::Done);
            return;
        }

        match serde_json::from_str::<FramePayload>(payload) {
            Ok(parsed) => {
                if let Some(text) = parsed.text.filter(|t| !t.is_empty()) {
                    self.stats.text_events += 1;
                    frames.push(Frame::Text(text));
                }
                if let Some(error) = parsed.error {
                    self.terminated = true;
                    frames.push(Frame::Error(error));
                }
            }
            Err(e) => {
                self.stats.dropped_frames += 1;
                tracing::debug!(
                    error = %e,
                    dropped = self.stats.dropped_frames,
                    "Dropped malformed frame"
                );
            }
        }
    }
}

/// Lazy frame sequence over a response body.
///
/// Stops polling the body as soon as a terminal frame is decoded, so frames
/// arriving after the sentinel on the same connection are never read. A
/// transport error is surfaced as [`Frame::Error`].
pub struct FrameStream<S> {
    body: S,
    decoder: StreamFrameDecoder,
    ready: VecDeque<Frame>,
    body_done: bool,
}

impl<S> FrameStream<S> {
    /// Wrap a body stream with a fresh decoder
    pub fn new(body: S) -> Self {
        Self {
            body,
            decoder: StreamFrameDecoder::new(),
            ready: VecDeque::new(),
            body_done: false,
        }
    }

    /// Counters of the underlying decoder
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Whether the sentinel or an error frame was decoded
    pub fn is_terminated(&self) -> bool {
        self.decoder.is_terminated()
    }
}

impl<S, B, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let this = &mut *self;
        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(frame));
            }
            if this.body_done || this.decoder.is_terminated() {
                return Poll::Ready(None);
            }
            match this.body.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.ready.extend(this.decoder.push(chunk.as_ref()));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.body_done = true;
                    return Poll::Ready(Some(Frame::Error(e.to_string())));
                }
                Poll::Ready(None) => {
                    this.body_done = true;
                    this.ready.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
