//! Tests for the dbpulse tracing setup.

use std::sync::Mutex;

use dbpulse_core::tracing::init_tracing;

/// Global mutex to serialize tracing tests (env var manipulation).
static TRACING_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_dbpulse_log_debug() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    // Output goes to stderr; we only verify initialization succeeds.
    std::env::set_var("DBPULSE_LOG", "debug");
    init_tracing();
    std::env::remove_var("DBPULSE_LOG");
}

#[test]
fn test_per_crate_filtering() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var("DBPULSE_LOG", "dbpulse_rules=debug,dbpulse_prompt=warn");
    init_tracing();
    std::env::remove_var("DBPULSE_LOG");
}

#[test]
fn test_init_tracing_idempotent() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    init_tracing();
    init_tracing();
    init_tracing();
}

#[test]
fn test_invalid_filter_falls_back() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var("DBPULSE_LOG", "this_is_garbage=not_a_level");
    init_tracing();
    std::env::remove_var("DBPULSE_LOG");
}
