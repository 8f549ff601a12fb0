//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. The worker parks on
//! the queue's wake signal and jobs end when the backend replies.
//! **Exceptions**: test code

use architectural_enforcement::production_sources;

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (line_number, code) in file.code_lines() {
            if code.contains("::sleep(") || code.contains(".sleep(") {
                violations.push(file.violation(line_number, "sleep"));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - Waiting on tokio::sync::Notify or a watch channel");
        eprintln!("  - Request timeouts configured on the HTTP client");
        eprintln!("  - Test code (#[cfg(test)] modules and tests/)");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
