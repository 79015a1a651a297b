//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the tests in `tests/`. They enforce:
//! - No sleep in production code outside reconnect back-off
//! - No blocking I/O inside async functions
//!
//! The scanners are line based. They skip comments and everything after a
//! `#[cfg(test)]` marker, which is where this workspace keeps unit tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["chat/core/src", "chat/cli/src"];

/// The workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../..")))
}

/// One Rust source file, split into lines
pub struct SourceFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

impl SourceFile {
    pub fn from_lines(path: impl Into<PathBuf>, lines: &[&str]) -> Self {
        Self {
            path: path.into(),
            lines: lines.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    /// Line indices that are production code (before any `#[cfg(test)]`)
    pub fn production_range(&self) -> std::ops::Range<usize> {
        let end = self
            .lines
            .iter()
            .position(|l| l.trim() == "#[cfg(test)]")
            .unwrap_or(self.lines.len());
        0..end
    }

    /// Format a finding for this file
    pub fn violation(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            idx + 1,
            what,
            self.lines[idx].trim()
        )
    }
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn rust_sources(dir: &str) -> Vec<SourceFile> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|e| {
            let content = fs::read_to_string(e.path()).ok()?;
            Some(SourceFile {
                path: e.path().to_path_buf(),
                lines: content.lines().map(str::to_string).collect(),
            })
        })
        .collect()
}

/// The code part of a line, with `//` comments removed
pub fn code_part(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
        return "";
    }
    // Keep `ws://`-style literals intact
    match line.find(" //") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn strip_visibility(line: &str) -> &str {
    let line = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return rest;
        }
    }
    line
}

/// Whether `line` opens a function; `Some(true)` for `async fn`
pub fn fn_signature(line: &str) -> Option<bool> {
    let line = strip_visibility(line);
    if line.starts_with("async fn ") {
        Some(true)
    } else if line.starts_with("fn ") || line.starts_with("const fn ") {
        Some(false)
    } else {
        None
    }
}

/// Whether the nearest function above `idx` is async
pub fn in_async_fn(lines: &[String], idx: usize) -> bool {
    (0..=idx)
        .rev()
        .find_map(|i| fn_signature(&lines[i]))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("    // sleep(1)"), "");
        assert_eq!(code_part("let x = 1; // note"), "let x = 1;");
        assert_eq!(code_part(r#"let u = "ws://host";"#), r#"let u = "ws://host";"#);
    }

    #[test]
    fn test_fn_signature() {
        assert_eq!(fn_signature("    pub async fn run(&mut self) {"), Some(true));
        assert_eq!(fn_signature("pub(crate) fn helper() {"), Some(false));
        assert_eq!(fn_signature("let f = 1;"), None);
    }

    #[test]
    fn test_production_range_stops_at_tests() {
        let file = SourceFile::from_lines("x.rs", &["fn a() {}", "#[cfg(test)]", "mod tests {}"]);
        assert_eq!(file.production_range(), 0..1);
    }

    #[test]
    fn test_in_async_fn() {
        let lines: Vec<String> = ["async fn a() {", "    x();", "}", "fn b() {", "    y();"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert!(in_async_fn(&lines, 1));
        assert!(!in_async_fn(&lines, 4));
    }
}
