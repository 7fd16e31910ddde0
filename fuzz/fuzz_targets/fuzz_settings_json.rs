//! Fuzz target for settings JSON parsing.
//!
//! Tests that settings deserialization handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lk_config::Settings;

fuzz_target!(|data: &[u8]| {
    // Try to parse as JSON - should never panic, only return an error
    let _ = serde_json::from_slice::<Settings>(data);
});
