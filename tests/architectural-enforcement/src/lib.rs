//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the integration tests in `tests/`. They enforce:
//! - No sleep() calls in production code (the worker waits on the queue signal)
//! - No blocking I/O inside async functions
//!
//! Scanning is line-based. Everything after a file's first `#[cfg(test)]`
//! is treated as test code and skipped.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["dispatch/core/src", "dispatch/daemon/src"];

/// One production source file, test modules stripped
#[derive(Debug)]
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines up to the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Build from raw file contents
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines = content
            .lines()
            .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
            .map(str::to_string)
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }

    /// Lines with trailing `//` comments removed, paired with 1-based line numbers
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines.iter().enumerate().filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            if code.trim().is_empty() {
                None
            } else {
                Some((idx + 1, code))
            }
        })
    }

    /// Kind of the function enclosing the given 1-based line
    pub fn enclosing_fn(&self, line_number: usize) -> Option<FnKind> {
        self.lines[..line_number.min(self.lines.len())]
            .iter()
            .rev()
            .find_map(|line| fn_kind(line))
    }

    /// Format a violation for this file
    pub fn violation(&self, line_number: usize, what: &str) -> String {
        let line = self
            .lines
            .get(line_number - 1)
            .map(|l| l.trim())
            .unwrap_or_default();
        format!("{}:{} - {}: {}", self.path.display(), line_number, what, line)
    }
}

/// Whether a function is async
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnKind {
    /// `async fn`
    Async,
    /// plain `fn`
    Sync,
}

/// Classify a line that opens a function signature
pub fn fn_kind(line: &str) -> Option<FnKind> {
    let mut rest = line.trim_start();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    if rest.starts_with("async fn ") {
        Some(FnKind::Async)
    } else if rest.starts_with("fn ") {
        Some(FnKind::Sync)
    } else {
        None
    }
}

/// The workspace root, two levels above this crate
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every production `.rs` file under [`PRODUCTION_DIRS`]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            let relative = path.strip_prefix(&root).unwrap_or(path);
            files.push(SourceFile::parse(relative, &content));
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_kind_detection() {
        assert_eq!(fn_kind("    pub async fn run(&self) {"), Some(FnKind::Async));
        assert_eq!(fn_kind("pub(crate) fn job() -> Job {"), Some(FnKind::Sync));
        assert_eq!(fn_kind("async fn main() -> Result<()> {"), Some(FnKind::Async));
        assert_eq!(fn_kind("    let f = |x| x + 1;"), None);
    }

    #[test]
    fn test_test_module_is_stripped() {
        let file = SourceFile::parse(
            "lib.rs",
            "fn real() {}\n#[cfg(test)]\nmod tests {\n    fn fake() {}\n}\n",
        );
        assert_eq!(file.lines, vec!["fn real() {}"]);
    }

    #[test]
    fn test_enclosing_fn() {
        let file = SourceFile::parse(
            "lib.rs",
            "fn load() {\n    read();\n}\nasync fn run() {\n    work().await;\n}\n",
        );
        assert_eq!(file.enclosing_fn(2), Some(FnKind::Sync));
        assert_eq!(file.enclosing_fn(5), Some(FnKind::Async));
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_sources();
        assert!(
            files.iter().any(|f| f.path.ends_with("queue.rs")),
            "scanner found no production sources under {:?}",
            workspace_root()
        );
    }
}
