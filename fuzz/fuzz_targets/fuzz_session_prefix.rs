//! Fuzz target for the session naming contract.
//!
//! Tests that prefix validation and directory name construction handle
//! arbitrary input without panicking, and that a validated prefix never
//! produces a finished name carrying the running marker.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lk_core::session::naming;

fuzz_target!(|prefix: &str| {
    if naming::validate_prefix(prefix).is_ok() {
        let at = chrono::Local::now();
        let running = naming::running_dir_name(prefix, 4242, at);
        let finished = naming::finished_dir_name(prefix, 4242, at);
        assert!(naming::is_running(&running));
        assert!(!naming::is_running(&finished));
    }
});
