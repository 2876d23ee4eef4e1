//! Engine Rules
//!
//! **Policy**: the engine paces output with timer deadlines owned by the
//! turn loop. Nothing may block a runtime thread, and library code reports
//! failures instead of panicking.

use architectural_enforcement::{scan, Violation};

const ENGINE_DIRS: &[&str] = &["conductor/core/src", "conductor/daemon/src"];
const ALL_DIRS: &[&str] = &["conductor/core/src", "conductor/daemon/src", "tui/src"];

fn report(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\nFound {} violation(s) of: {rule}", violations.len());
}

#[test]
fn test_no_blocking_sleep() {
    let violations = scan(ALL_DIRS, |code| code.contains("thread::sleep("));
    report("no std::thread::sleep in async code", &violations);
}

#[test]
fn test_engine_waits_on_deadlines() {
    let violations = scan(ENGINE_DIRS, |code| {
        code.contains("time::sleep(") || code.contains(" sleep(")
    });
    report("engine timers use sleep_until deadlines", &violations);
}

#[test]
fn test_no_panicking_unwraps() {
    let violations = scan(ALL_DIRS, |code| {
        code.contains(".unwrap()") || code.contains(".expect(")
    });
    report("no unwrap()/expect() outside tests", &violations);
}

#[test]
fn test_core_has_no_ui_dependencies() {
    let violations = scan(&["conductor/core/src"], |code| {
        code.contains("ratatui::") || code.contains("crossterm::")
    });
    report("the engine stays independent of UI frameworks", &violations);
}
