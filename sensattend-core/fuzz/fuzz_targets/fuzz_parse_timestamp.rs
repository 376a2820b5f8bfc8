#![no_main]

//! Fuzz target for parse_timestamp()
//!
//! Any accepted timestamp must render a label.
//!
//! Run with: cargo +nightly fuzz run fuzz_parse_timestamp

use libfuzzer_sys::fuzz_target;
use sensattend_core::{format_label, parse_timestamp};

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        if let Ok(timestamp) = parse_timestamp(raw) {
            let _ = format_label(&timestamp);
        }
    }
});
