#![no_main]

//! Fuzz target for ResultHistory::from_body()
//!
//! Feeds arbitrary bytes as a `/results` answer under both a success and an
//! error status. Decoding must never panic, and an accepted history must be
//! ordered newest-first.
//!
//! Run with: cargo +nightly fuzz run fuzz_history_body

use libfuzzer_sys::fuzz_target;
use sensattend_core::ResultHistory;

fuzz_target!(|data: &[u8]| {
    if let Ok(history) = ResultHistory::from_body(200, data) {
        let entries = history.entries();
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        for group in history.groups() {
            assert!(!group.label.is_empty());
        }
    }
    let _ = ResultHistory::from_body(500, data);
});
