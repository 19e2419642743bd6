//! Sequential Bayesian estimate of whether an access point is an evil twin.
//!
//! Belief is kept as log-odds of "evil". Each protocol outcome adds the log
//! of its likelihood ratio; before adding, the accumulated log-odds decay
//! toward zero according to the time since the previous update.
//!
//! ```text
//! lr        = P(outcome | evil) / P(outcome | legit)
//! log_odds  = log_odds * exp(-dt / 30) + ln(lr)
//! posterior = clamp(logistic(log_odds), 0.001, 0.999)
//! ```

use serde::{Deserialize, Serialize};

use crate::decay::{apply_decay, DecayConfig};
use crate::window::{Observation, ObservationWindow, WindowProgress, DEFAULT_WINDOW_CAPACITY};

/// Prior probability that any access point is evil.
pub const DEFAULT_PRIOR_EVIL: f64 = 0.25;

/// P(success | evil).
pub const P_SUCCESS_GIVEN_EVIL: f64 = 0.15;

/// P(success | legitimate).
pub const P_SUCCESS_GIVEN_LEGIT: f64 = 0.85;

/// Lower posterior clamp.
pub const POSTERIOR_MIN: f64 = 0.001;

/// Upper posterior clamp.
pub const POSTERIOR_MAX: f64 = 0.999;

/// Default threshold for [`ApDetector::is_likely_evil`].
pub const DEFAULT_EVIL_THRESHOLD: f64 = 0.2;

/// Parameters shared by every detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Prior evil probability.
    pub prior_evil: f64,
    /// P(success | evil). P(failure | evil) is its complement.
    pub p_success_given_evil: f64,
    /// P(success | legitimate). P(failure | legitimate) is its complement.
    pub p_success_given_legit: f64,
    /// Evidence forgetting.
    pub decay: DecayConfig,
    /// Outcomes kept for progress reporting.
    pub window_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            prior_evil: DEFAULT_PRIOR_EVIL,
            p_success_given_evil: P_SUCCESS_GIVEN_EVIL,
            p_success_given_legit: P_SUCCESS_GIVEN_LEGIT,
            decay: DecayConfig::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}

impl DetectorConfig {
    /// Log-likelihood ratio of one outcome.
    pub fn log_likelihood_ratio(&self, success: bool) -> f64 {
        let (evil, legit) = if success {
            (self.p_success_given_evil, self.p_success_given_legit)
        } else {
            (1.0 - self.p_success_given_evil, 1.0 - self.p_success_given_legit)
        };
        (evil / legit).ln()
    }
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp_posterior(p: f64) -> f64 {
    if p.is_nan() {
        return POSTERIOR_MAX;
    }
    p.clamp(POSTERIOR_MIN, POSTERIOR_MAX)
}

/// Per-access-point evil-twin estimator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApDetector {
    config: DetectorConfig,
    log_odds: f64,
    posterior: f64,
    last_update_ms: u64,
    window: ObservationWindow,
    counted: bool,
}

impl ApDetector {
    /// Fresh detector holding only the prior.
    pub fn new(config: DetectorConfig, now_ms: u64) -> Self {
        let prior = clamp_posterior(config.prior_evil);
        Self {
            log_odds: logit(prior),
            posterior: prior,
            last_update_ms: now_ms,
            window: ObservationWindow::new(config.window_capacity),
            counted: false,
            config,
        }
    }

    /// Fold in one protocol outcome observed at `now_ms`. Returns the new
    /// posterior.
    pub fn observe(&mut self, success: bool, now_ms: u64) -> f64 {
        self.window.push(Observation {
            success,
            at_ms: now_ms,
        });

        self.log_odds = apply_decay(self.log_odds, &self.config.decay, self.last_update_ms, now_ms)
            + self.config.log_likelihood_ratio(success);
        self.last_update_ms = self.last_update_ms.max(now_ms);
        self.posterior = clamp_posterior(logistic(self.log_odds));
        self.posterior
    }

    /// Current clamped posterior evil probability.
    pub fn posterior(&self) -> f64 {
        self.posterior
    }

    /// Current log-odds.
    pub fn log_odds(&self) -> f64 {
        self.log_odds
    }

    /// Prior this detector started from.
    pub fn prior(&self) -> f64 {
        self.config.prior_evil
    }

    /// Time of the last update, Unix milliseconds.
    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    /// `posterior > threshold`.
    pub fn is_likely_evil(&self, threshold: f64) -> bool {
        self.posterior > threshold
    }

    /// `|posterior - 0.5| * 2`: 0 is uninformative, 1 is certain.
    pub fn confidence(&self) -> f64 {
        (self.posterior - 0.5).abs() * 2.0
    }

    /// Fill level of the outcome window.
    pub fn progress(&self) -> WindowProgress {
        self.window.progress()
    }

    /// The outcome window.
    pub fn window(&self) -> &ObservationWindow {
        &self.window
    }

    /// Whether a correct detection was already tallied.
    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// Mark this detector as tallied. Returns `true` only the first time.
    pub fn mark_counted(&mut self) -> bool {
        !std::mem::replace(&mut self.counted, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ApDetector {
        ApDetector::new(DetectorConfig::default(), 0)
    }

    #[test]
    fn test_starts_at_prior() {
        let d = detector();
        assert!((d.posterior() - DEFAULT_PRIOR_EVIL).abs() < 1e-12);
        assert!(d.is_likely_evil(0.2));
        assert!(!d.is_likely_evil(0.3));
        assert!((d.confidence() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_failures_converge_to_evil() {
        let mut d = detector();
        for _ in 0..50 {
            d.observe(false, 0);
        }
        assert!(d.posterior() > 0.9);
        assert!(d.is_likely_evil(0.5));
        assert_eq!(d.posterior(), POSTERIOR_MAX);
    }

    #[test]
    fn test_successes_converge_to_legit() {
        let mut d = detector();
        for _ in 0..50 {
            d.observe(true, 0);
        }
        assert!(d.posterior() < 0.1);
        assert_eq!(d.posterior(), POSTERIOR_MIN);
    }

    #[test]
    fn test_single_failure_raises_belief() {
        let mut d = detector();
        let before = d.posterior();
        d.observe(false, 0);
        assert!(d.posterior() > before);
    }

    #[test]
    fn test_likelihood_ratios_symmetric() {
        let config = DetectorConfig::default();
        let fail = config.log_likelihood_ratio(false);
        let ok = config.log_likelihood_ratio(true);
        assert!((fail + ok).abs() < 1e-12);
        assert!((fail - (0.85f64 / 0.15).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_idle_gap_damps_evidence() {
        let config = DetectorConfig::default();
        let prior_log_odds = logit(DEFAULT_PRIOR_EVIL);
        let step = config.log_likelihood_ratio(false);

        let mut d = ApDetector::new(config, 0);
        d.observe(false, 0);
        d.observe(false, 300_000);

        let undamped = (prior_log_odds + step + step).abs();
        assert!(d.log_odds().abs() < undamped);
        // After ten time constants only the second step is left, give or take
        assert!((d.log_odds() - step).abs() < 1e-3);
    }

    #[test]
    fn test_window_capped_at_capacity() {
        let mut d = detector();
        for i in 0..150 {
            d.observe(i % 3 == 0, i);
        }
        assert_eq!(d.progress().current, 100);
        assert_eq!(d.progress().target, 100);
    }

    #[test]
    fn test_mark_counted_is_one_shot() {
        let mut d = detector();
        assert!(!d.is_counted());
        assert!(d.mark_counted());
        assert!(!d.mark_counted());
        assert!(d.is_counted());
    }

    #[test]
    fn test_posterior_always_in_clamp_range() {
        let mut d = detector();
        for i in 0..500u64 {
            let p = d.observe(i % 7 != 0, i * 13);
            assert!((POSTERIOR_MIN..=POSTERIOR_MAX).contains(&p));
        }
    }
}
