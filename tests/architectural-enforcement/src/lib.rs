//! Architectural Enforcement
//!
//! Source-scanning helpers for the rules checked in `tests/`:
//! - No blocking sleeps anywhere in async code
//! - No ad-hoc `tokio::time::sleep` in the engine or daemon; timers are
//!   deadlines (`sleep_until`) owned by the turn loop
//! - No `unwrap()`/`expect()` outside tests in library and binary code
//!
//! Everything from the first `#[cfg(test)]` line of a file onward is treated
//! as test code and skipped.

use std::fs;
use std::path::{Path, PathBuf};

/// A rule violation at a source line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Every `.rs` file under `dir`, relative to the workspace root
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Production lines of a source file: comments stripped, test module cut off
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, code_part(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Scan production code under each directory for lines matching `is_violation`
pub fn scan(dirs: &[&str], is_violation: impl Fn(&str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    for dir in dirs {
        for path in rust_files(dir) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line, code) in production_lines(&content) {
                if is_violation(code) {
                    violations.push(Violation {
                        path: path.clone(),
                        line,
                        text: code.trim().to_string(),
                    });
                }
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// note\nlet x = y.unwrap(); // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = y.unwrap(); ")]);
    }

    #[test]
    fn test_rust_files_finds_this_package() {
        let files = rust_files("tests/architectural-enforcement/src");
        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
    }
}
