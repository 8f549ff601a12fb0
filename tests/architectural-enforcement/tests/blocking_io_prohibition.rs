//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async production code MUST NOT use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::io`, not `std::fs`, `std::net`
//! **Acceptable**: Blocking calls inside plain `fn`s that run before the runtime
//! starts, such as reading the config file in the daemon's `main`.

use architectural_enforcement::{production_sources, FnKind};

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::thread::sleep", "Blocking sleep"),
    ("load_config(", "Blocking config load"),
    ("load_config_from_path(", "Blocking config load"),
];

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (line_number, code) in file.code_lines() {
            // Module-level imports would leak into every function
            if code.trim_start().starts_with("use std::fs")
                || code.trim_start().starts_with("use std::net")
            {
                violations.push(file.violation(line_number, "Blocking I/O import"));
                continue;
            }

            for (pattern, what) in FORBIDDEN {
                if code.contains(pattern) && file.enclosing_fn(line_number) != Some(FnKind::Sync) {
                    violations.push(file.violation(line_number, what));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await, tokio::fs::write().await");
        eprintln!("  - tokio::io::stdin() with AsyncBufReadExt");
        eprintln!("  - reqwest::Client with .await");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
