//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in production code MUST NOT use blocking I/O.
//! Use `tokio::net`, `tokio::fs` and async `reqwest`. Blocking calls are fine
//! in plain `fn`s (config loading, CLI input before a turn starts).

use architectural_enforcement::{code_part, in_async_fn, rust_sources, SourceFile, PRODUCTION_DIRS};

const BLOCKING: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::thread::sleep", "Thread sleep"),
];

/// Test that production async code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<String> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| rust_sources(dir))
        .flat_map(|file| blocking_violations(&file))
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn blocking_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();
    for idx in file.production_range() {
        let code = code_part(&file.lines[idx]);
        if code.trim_start().starts_with("use ") || !in_async_fn(&file.lines, idx) {
            continue;
        }
        for (pattern, what) in BLOCKING {
            if code.contains(pattern) {
                violations.push(file.violation(idx, what));
            }
        }
    }
    violations
}

#[test]
fn test_blocking_io_detection() {
    let file = SourceFile::from_lines(
        "bad.rs",
        &[
            "pub async fn load() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ],
    );
    assert_eq!(blocking_violations(&file).len(), 1);
}

#[test]
fn test_sync_function_allowed() {
    let file = SourceFile::from_lines(
        "config.rs",
        &[
            "pub fn load_config_from_path(path: &Path) {",
            "    let contents = std::fs::read_to_string(path)?;",
            "}",
        ],
    );
    assert!(blocking_violations(&file).is_empty());
}
