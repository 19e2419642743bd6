//! Time sources.
//!
//! Simulation logic takes `now_ms` explicitly; only the async driver asks a
//! [`Clock`]. Tests swap in [`ManualClock`] to control time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of Unix millisecond timestamps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in Unix milliseconds.
    fn now_ms(&self) -> u64;
}

/// Wall clock shifted by a fixed skew.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock {
    skew_ms: i64,
}

impl SystemClock {
    /// Wall clock shifted by `skew_secs`.
    pub fn with_skew_secs(skew_secs: i64) -> Self {
        Self {
            skew_ms: skew_secs.saturating_mul(1_000),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let ms = Utc::now().timestamp_millis().saturating_add(self.skew_ms);
        u64::try_from(ms).unwrap_or(0)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock starting at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to `now_ms`.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
