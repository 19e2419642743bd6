//! Global strategy rotation and per-strategy accounting.

use serde::{Deserialize, Serialize};

use crate::strategy::Strategy;

/// Default length of one strategy window in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 30_000;

/// Cumulative traffic counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyCounters {
    /// Packets sent.
    pub sent: u64,
    /// Packets delivered.
    pub delivered: u64,
    /// Packets dropped.
    pub dropped: u64,
    /// Total cost charged.
    pub cost: f64,
}

impl StrategyCounters {
    /// Account one packet.
    pub fn record(&mut self, delivered: bool, cost: f64) {
        self.sent += 1;
        if delivered {
            self.delivered += 1;
        } else {
            self.dropped += 1;
        }
        self.cost += cost;
    }

    /// Mean cost per packet, zero when nothing was sent.
    pub fn mean_cost(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.cost / self.sent as f64
        }
    }
}

/// Counters for each strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PerStrategy {
    /// TRUST bucket.
    pub trust: StrategyCounters,
    /// VERIFY bucket.
    pub verify: StrategyCounters,
    /// AVOID bucket.
    pub avoid: StrategyCounters,
}

impl PerStrategy {
    /// Bucket for `strategy`.
    pub fn get(&self, strategy: Strategy) -> &StrategyCounters {
        match strategy {
            Strategy::Trust => &self.trust,
            Strategy::Verify => &self.verify,
            Strategy::Avoid => &self.avoid,
        }
    }

    /// Mutable bucket for `strategy`.
    pub fn get_mut(&mut self, strategy: Strategy) -> &mut StrategyCounters {
        match strategy {
            Strategy::Trust => &mut self.trust,
            Strategy::Verify => &mut self.verify,
            Strategy::Avoid => &mut self.avoid,
        }
    }
}

/// Active strategy and its window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategySchedule {
    active: Strategy,
    window_ms: u64,
    window_ends_at_ms: u64,
    per_strategy: PerStrategy,
}

impl StrategySchedule {
    /// Start with `initial` active from `now_ms`.
    pub fn new(initial: Strategy, window_ms: u64, now_ms: u64) -> Self {
        let window_ms = window_ms.max(1);
        Self {
            active: initial,
            window_ms,
            window_ends_at_ms: now_ms.saturating_add(window_ms),
            per_strategy: PerStrategy::default(),
        }
    }

    /// Strategy in force.
    pub fn active(&self) -> Strategy {
        self.active
    }

    /// When the current window closes, Unix milliseconds.
    pub fn window_ends_at_ms(&self) -> u64 {
        self.window_ends_at_ms
    }

    /// Window length.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Advance to the next strategy and open a fresh window at `now_ms`.
    pub fn rotate(&mut self, now_ms: u64) -> Strategy {
        self.active = self.active.next();
        self.window_ends_at_ms = now_ms.saturating_add(self.window_ms);
        self.active
    }

    /// Rotate if the current window has closed.
    pub fn rotate_if_due(&mut self, now_ms: u64) -> Option<Strategy> {
        (now_ms >= self.window_ends_at_ms).then(|| self.rotate(now_ms))
    }

    /// Account one packet sent under `strategy`.
    pub fn record(&mut self, strategy: Strategy, delivered: bool, cost: f64) {
        self.per_strategy.get_mut(strategy).record(delivered, cost);
    }

    /// Per-strategy counters.
    pub fn per_strategy(&self) -> &PerStrategy {
        &self.per_strategy
    }
}

impl Default for StrategySchedule {
    fn default() -> Self {
        Self::new(Strategy::Trust, DEFAULT_WINDOW_MS, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_cycle_and_window() {
        let mut schedule = StrategySchedule::new(Strategy::Trust, 30_000, 1_000);
        assert_eq!(schedule.window_ends_at_ms(), 31_000);

        assert_eq!(schedule.rotate(31_000), Strategy::Verify);
        assert_eq!(schedule.window_ends_at_ms(), 61_000);
        assert_eq!(schedule.rotate(61_000), Strategy::Avoid);
        assert_eq!(schedule.rotate(91_000), Strategy::Trust);
    }

    #[test]
    fn test_rotate_if_due() {
        let mut schedule = StrategySchedule::new(Strategy::Trust, 30_000, 0);
        assert_eq!(schedule.rotate_if_due(29_999), None);
        assert_eq!(schedule.rotate_if_due(30_000), Some(Strategy::Verify));
        assert_eq!(schedule.rotate_if_due(30_001), None);
    }

    #[test]
    fn test_record_by_bucket() {
        let mut schedule = StrategySchedule::default();
        schedule.record(Strategy::Trust, true, 1.0);
        schedule.record(Strategy::Trust, false, 45.0);
        schedule.record(Strategy::Verify, false, 2.5);

        let trust = schedule.per_strategy().get(Strategy::Trust);
        assert_eq!((trust.sent, trust.delivered, trust.dropped), (2, 1, 1));
        assert_eq!(trust.cost, 46.0);
        assert_eq!(trust.mean_cost(), 23.0);

        let verify = schedule.per_strategy().get(Strategy::Verify);
        assert_eq!(verify.dropped, 1);
        assert_eq!(schedule.per_strategy().get(Strategy::Avoid).sent, 0);
    }
}
