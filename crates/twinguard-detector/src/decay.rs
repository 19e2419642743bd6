//! Exponential forgetting of log-odds evidence.
//!
//! Between observations the accumulated log-odds shrink toward zero (an
//! uninformative 50/50 belief) by `exp(-dt / time_constant)`.

use serde::{Deserialize, Serialize};

/// Default forgetting time constant in seconds.
pub const DEFAULT_TIME_CONSTANT_SECS: f64 = 30.0;

/// Shortest accepted time constant, keeps the exponent finite.
pub const MIN_TIME_CONSTANT_SECS: f64 = 0.001;

/// Configuration for evidence decay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Time constant in seconds.
    pub time_constant_secs: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            time_constant_secs: DEFAULT_TIME_CONSTANT_SECS,
        }
    }
}

impl DecayConfig {
    /// Create a decay configuration. Non-finite or tiny constants are raised
    /// to [`MIN_TIME_CONSTANT_SECS`].
    #[must_use]
    pub fn new(time_constant_secs: f64) -> Self {
        let time_constant_secs = if time_constant_secs.is_finite() {
            time_constant_secs.max(MIN_TIME_CONSTANT_SECS)
        } else {
            DEFAULT_TIME_CONSTANT_SECS
        };
        Self { time_constant_secs }
    }

    /// Multiplier applied to log-odds after `elapsed_secs` of silence.
    #[must_use]
    pub fn factor(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 1.0;
        }
        (-elapsed_secs / self.time_constant_secs).exp()
    }
}

/// Seconds between two millisecond timestamps. Clock steps backwards count
/// as zero.
#[must_use]
pub fn elapsed_secs(last_ms: u64, now_ms: u64) -> f64 {
    now_ms.saturating_sub(last_ms) as f64 / 1000.0
}

/// Decay `log_odds` for the time between `last_ms` and `now_ms`.
#[must_use]
pub fn apply_decay(log_odds: f64, config: &DecayConfig, last_ms: u64, now_ms: u64) -> f64 {
    log_odds * config.factor(elapsed_secs(last_ms, now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_elapsed_time_no_decay() {
        let config = DecayConfig::default();
        assert_eq!(apply_decay(3.0, &config, 1_000, 1_000), 3.0);
    }

    #[test]
    fn test_one_time_constant() {
        let config = DecayConfig::default();
        let decayed = apply_decay(1.0, &config, 0, 30_000);
        assert!((decayed - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_clock_going_backwards_is_ignored() {
        let config = DecayConfig::default();
        assert_eq!(apply_decay(2.0, &config, 5_000, 1_000), 2.0);
    }

    #[test]
    fn test_long_idle_forgets_almost_everything() {
        let config = DecayConfig::default();
        let decayed = apply_decay(50.0, &config, 0, 600_000);
        assert!(decayed.abs() < 1e-6);
    }

    #[test]
    fn test_sign_is_preserved() {
        let config = DecayConfig::default();
        assert!(apply_decay(-4.0, &config, 0, 10_000) < 0.0);
        assert!(apply_decay(4.0, &config, 0, 10_000) > 0.0);
    }

    #[test]
    fn test_config_sanitized() {
        assert_eq!(DecayConfig::new(0.0).time_constant_secs, MIN_TIME_CONSTANT_SECS);
        assert_eq!(DecayConfig::new(f64::NAN).time_constant_secs, DEFAULT_TIME_CONSTANT_SECS);
        assert_eq!(DecayConfig::new(12.0).time_constant_secs, 12.0);
    }
}
