//! Timestamp tolerance for packet verification.
//!
//! Timestamps are Unix milliseconds. A packet is fresh while
//! `|now - timestamp| <= tolerance`; the boundary itself is accepted.

use serde::{Deserialize, Serialize};

use crate::limits::{DEFAULT_TOLERANCE_SECS, MAX_TOLERANCE_SECS, MIN_TOLERANCE_SECS};

/// Accepted clock distance between sender and receiver, in whole seconds.
///
/// Always within `[MIN_TOLERANCE_SECS, MAX_TOLERANCE_SECS]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Tolerance(u64);

impl Tolerance {
    /// Clamp `secs` into the configurable range.
    pub fn clamped(secs: u64) -> Self {
        Self(secs.clamp(MIN_TOLERANCE_SECS, MAX_TOLERANCE_SECS))
    }

    /// Tolerance in seconds.
    pub fn secs(self) -> u64 {
        self.0
    }

    /// Tolerance in milliseconds.
    pub fn millis(self) -> u64 {
        self.0 * 1000
    }

    /// Whether `timestamp_ms` is close enough to `now_ms`.
    pub fn accepts(self, timestamp_ms: u64, now_ms: u64) -> bool {
        now_ms.abs_diff(timestamp_ms) <= self.millis()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE_SECS)
    }
}

impl From<u64> for Tolerance {
    fn from(secs: u64) -> Self {
        Self::clamped(secs)
    }
}

impl From<Tolerance> for u64 {
    fn from(t: Tolerance) -> u64 {
        t.0
    }
}
