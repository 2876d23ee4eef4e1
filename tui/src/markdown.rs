//! Markdown Rendering
//!
//! Turns a finished assistant reply into plain terminal text. Emphasis
//! markers are dropped, lists get bullets, code blocks are indented and raw
//! HTML never reaches the screen.

use std::sync::Arc;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use retroterm_core::MarkdownRenderer;

const CODE_INDENT: &str = "    ";
const LIST_INDENT: &str = "  ";
const BULLET: &str = "• ";

/// Renderer to hand to the engine
pub fn renderer() -> MarkdownRenderer {
    Arc::new(|raw: &str| render(raw))
}

/// Render markdown to display lines joined by `\n`
pub fn render(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let mut writer = Writer::new(Parser::new_ext(input, options));
    writer.run();
    writer.finish()
}

struct Writer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    iter: I,
    lines: Vec<String>,
    current: String,
    /// One entry per open list: `Some(next number)` for ordered lists
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    in_code_block: bool,
    needs_blank: bool,
}

impl<'a, I> Writer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn new(iter: I) -> Self {
        Self {
            iter,
            lines: Vec::new(),
            current: String::new(),
            lists: Vec::new(),
            links: Vec::new(),
            in_code_block: false,
            needs_blank: false,
        }
    }

    fn run(&mut self) {
        while let Some(event) = self.iter.next() {
            self.handle_event(event);
        }
        self.flush_line();
    }

    fn finish(self) -> String {
        let mut lines = self.lines;
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn handle_event(&mut self, event: Event<'a>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.current.push_str(&code),
            Event::SoftBreak => self.current.push(' '),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.start_block();
                self.lines.push("———".to_string());
                self.needs_blank = true;
            }
            // Raw HTML is dropped, never echoed
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'a>) {
        match tag {
            Tag::Paragraph | Tag::Heading { .. } => {
                if self.lists.is_empty() {
                    self.start_block();
                }
            }
            Tag::CodeBlock(kind) => {
                self.start_block();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(format!("{CODE_INDENT}[{lang}]"));
                    }
                }
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.start_block();
                } else {
                    self.flush_line();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => BULLET.to_string(),
                };
                self.current = format!("{}{marker}", LIST_INDENT.repeat(depth));
            }
            Tag::Link { dest_url, .. } => self.links.push(dest_url.to_string()),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) => {
                self.flush_line();
                self.needs_blank = self.lists.is_empty();
            }
            TagEnd::CodeBlock => {
                self.flush_line();
                self.in_code_block = false;
                self.needs_blank = true;
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.lists.pop();
                self.needs_blank = self.lists.is_empty();
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Link => {
                if let Some(url) = self.links.pop() {
                    if !url.is_empty() && !self.current.ends_with(url.as_str()) {
                        self.current.push_str(&format!(" ({url})"));
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_code_block {
            self.current.push_str(text);
            return;
        }
        for line in text.lines() {
            self.lines.push(format!("{CODE_INDENT}{line}"));
        }
    }

    fn start_block(&mut self) {
        self.flush_line();
        if self.needs_blank && !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.needs_blank = false;
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            let line = std::mem::take(&mut self.current);
            self.lines.push(line.trim_end().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("hello there"), "hello there");
    }

    #[test]
    fn test_emphasis_markers_are_dropped() {
        assert_eq!(render("**bold** and *soft* and `code`"), "bold and soft and code");
    }

    #[test]
    fn test_paragraphs_are_separated() {
        assert_eq!(render("one\ntwo\n\nthree"), "one two\n\nthree");
    }

    #[test]
    fn test_lists() {
        assert_eq!(render("- a\n- b\n  - c"), "• a\n• b\n  • c");
        assert_eq!(render("1. first\n2. second"), "1. first\n2. second");
    }

    #[test]
    fn test_code_block_is_indented() {
        assert_eq!(
            render("look:\n\n```rust\nlet x = 1;\n```"),
            "look:\n\n    [rust]\n    let x = 1;"
        );
    }

    #[test]
    fn test_html_is_dropped() {
        let out = render("hi <script>alert(1)</script> there");
        assert!(!out.contains("<script>"));
        assert!(out.contains("hi"));

        let out = render("<div onclick=\"x()\">\nblock\n</div>\n\nafter");
        assert!(!out.contains("<div"));
        assert!(out.contains("after"));
    }

    #[test]
    fn test_links_show_destination() {
        assert_eq!(
            render("see [docs](https://example.com)"),
            "see docs (https://example.com)"
        );
    }

    #[test]
    fn test_renderer_is_shareable() {
        let render_fn = renderer();
        assert_eq!(render_fn("# Title"), "Title");
    }
}
