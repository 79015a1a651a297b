//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep. Streams are driven by
//! awaiting channel I/O, never by polling.
//! **Exceptions**: back-off between reconnect attempts, test code

use architectural_enforcement::{code_part, rust_sources, SourceFile, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| rust_sources(dir))
        .flat_map(|file| sleep_violations(&file))
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Back-off between reconnect attempts");
        eprintln!("  - Test code (after #[cfg(test)])");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for frames (await the channel instead)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn sleep_violations(file: &SourceFile) -> Vec<String> {
    file.production_range()
        .filter(|&idx| {
            let code = code_part(&file.lines[idx]);
            code.contains("::sleep(") || code.contains(".sleep(")
        })
        .filter(|&idx| !is_backoff_context(&file.lines, idx))
        .map(|idx| file.violation(idx, "sleep"))
        .collect()
}

/// Back-off: a delay calculation and a retry/reconnect mention nearby
fn is_backoff_context(lines: &[String], idx: usize) -> bool {
    let range = idx.saturating_sub(15)..std::cmp::min(idx + 5, lines.len());

    let mut has_delay_calc = false;
    let mut has_retry_context = false;
    for line in &lines[range] {
        let line = line.to_lowercase();
        if line.contains("delay_after(")
            || line.contains("<<")
            || line.contains("pow")
            || line.contains("saturating_mul")
        {
            has_delay_calc = true;
        }
        if line.contains("retry")
            || line.contains("reconnect")
            || line.contains("backoff")
            || line.contains("back-off")
            || line.contains("attempt")
        {
            has_retry_context = true;
        }
    }
    has_delay_calc && has_retry_context
}

#[test]
fn test_sleep_violation_detection() {
    let file = SourceFile::from_lines(
        "poll.rs",
        &[
            "async fn poll() {",
            "    loop {",
            "        tokio::time::sleep(Duration::from_millis(10)).await;",
            "    }",
            "}",
        ],
    );
    assert_eq!(sleep_violations(&file).len(), 1);
}

#[test]
fn test_reconnect_backoff_allowed() {
    let file = SourceFile::from_lines(
        "session.rs",
        &[
            "async fn connect(&mut self) {",
            "    // back-off before the next reconnect attempt",
            "    let delay = policy.delay_after(attempt);",
            "    tokio::time::sleep(delay).await;",
            "}",
        ],
    );
    assert!(sleep_violations(&file).is_empty());
}

#[test]
fn test_sleep_in_tests_allowed() {
    let file = SourceFile::from_lines(
        "x.rs",
        &[
            "#[cfg(test)]",
            "mod tests {",
            "    async fn t() { tokio::time::sleep(d).await; }",
            "}",
        ],
    );
    assert!(sleep_violations(&file).is_empty());
}
