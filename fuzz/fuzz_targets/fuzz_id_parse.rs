//! Fuzz target for identifier validation.
//!
//! Any string that validates must round-trip through its string form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twinguard_identity::{ApId, DeviceId};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(id) = ApId::new(s) {
            assert_eq!(id.as_str(), s);
        }
        if let Ok(id) = DeviceId::new(s) {
            assert_eq!(id.to_string(), s);
        }
    }
});
