//! Aggregate counters and the stats snapshot.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use twinguard_detector::{ApDetector, WindowProgress, DEFAULT_EVIL_THRESHOLD};
use twinguard_game::{PerStrategy, RouterDecision, SensitivityProfile, Strategy};
use twinguard_identity::ApId;

use crate::registry::ApRegistry;

/// Population-wide counters, cumulative since startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    /// Packets sent.
    pub total_sent: u64,
    /// Packets delivered under the cost model's verdict.
    pub total_delivered: u64,
    /// Packets not delivered.
    pub dropped: u64,
    /// Sum of all packet costs.
    pub cumulative_cost: f64,
    /// Fixed or guest APs manually turned malicious.
    pub spoofers_spawned: u64,
    /// Malicious APs whose detector reached a confident verdict.
    pub evil_aps_detected_correctly: u64,
    /// Guest APs created.
    pub guest_aps_spawned: u64,
    /// Guest APs created malicious.
    pub evil_guest_aps_spawned: u64,
    /// Packets sent under AVOID to an AP already in the avoided set.
    pub packets_avoided: u64,
}

impl Counters {
    /// Account one packet.
    pub fn record_packet(&mut self, delivered: bool, cost: f64, avoided: bool) {
        self.total_sent += 1;
        if delivered {
            self.total_delivered += 1;
        } else {
            self.dropped += 1;
        }
        self.cumulative_cost += cost;
        if avoided {
            self.packets_avoided += 1;
        }
    }
}

/// Detector state as reported to observers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSnapshot {
    /// Posterior evil probability.
    pub posterior_evil: f64,
    /// Confidence in the posterior.
    pub confidence: f64,
    /// Posterior above the default threshold.
    pub is_likely_evil: bool,
    /// Outcomes in the window.
    pub observation_count: usize,
    /// Window fill.
    pub buffer_progress: WindowProgress,
}

impl From<&ApDetector> for DetectorSnapshot {
    fn from(detector: &ApDetector) -> Self {
        let progress = detector.progress();
        Self {
            posterior_evil: detector.posterior(),
            confidence: detector.confidence(),
            is_likely_evil: detector.is_likely_evil(DEFAULT_EVIL_THRESHOLD),
            observation_count: progress.current,
            buffer_progress: progress,
        }
    }
}

/// Full statistics snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// When the snapshot was taken, Unix milliseconds.
    pub timestamp_ms: u64,
    /// Cumulative counters.
    #[serde(flatten)]
    pub counters: Counters,
    /// Cost accrued since the previous periodic broadcast.
    pub cost_since_last_tick: f64,
    /// Fraction of APs whose detector verdict matches ground truth.
    pub detection_accuracy: f64,
    /// Per-AP detector state.
    pub detectors: BTreeMap<ApId, DetectorSnapshot>,
    /// Per-AP load, percent of capacity.
    pub ap_loads: BTreeMap<ApId, f64>,
    /// Latest advisory router decision per AP.
    pub router: BTreeMap<ApId, RouterDecision>,
    /// APs currently malicious.
    pub active_evil_aps: usize,
    /// Guest APs alive.
    pub active_guest_aps: usize,
    /// Size of the avoided set.
    pub avoided_aps_count: usize,
    /// Active sensitivity profile: mode, matrix, risk and breach parameters.
    pub profile: SensitivityProfile,
    /// Globally active strategy.
    pub active_strategy: Strategy,
    /// When the current strategy window closes, Unix milliseconds.
    pub mode_ends_at_ms: u64,
    /// Per-strategy counters.
    pub per_strategy: PerStrategy,
    /// Probability that a new guest is malicious.
    pub evil_probability: f64,
    /// Timestamp tolerance in seconds.
    pub tolerance_secs: u64,
    /// Connected devices.
    pub device_count: usize,
}

/// Fraction of APs for which `is_likely_evil(0.2)` equals the ground truth.
///
/// Detectors without a registered AP are skipped. Returns 1.0 when there is
/// nothing to judge.
pub fn detection_accuracy(registry: &ApRegistry, detectors: &HashMap<ApId, ApDetector>) -> f64 {
    let mut total = 0usize;
    let mut correct = 0usize;
    for (id, detector) in detectors {
        let Some(ap) = registry.get(id) else {
            continue;
        };
        total += 1;
        if detector.is_likely_evil(DEFAULT_EVIL_THRESHOLD) == !ap.is_legitimate() {
            correct += 1;
        }
    }
    if total == 0 {
        1.0
    } else {
        correct as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinguard_detector::DetectorConfig;

    #[test]
    fn test_counters() {
        let mut counters = Counters::default();
        counters.record_packet(true, 1.0, false);
        counters.record_packet(false, 4.0, true);
        assert_eq!(counters.total_sent, 2);
        assert_eq!(counters.total_delivered, 1);
        assert_eq!(counters.dropped, 1);
        assert_eq!(counters.cumulative_cost, 5.0);
        assert_eq!(counters.packets_avoided, 1);
    }

    #[test]
    fn test_accuracy_empty_is_one() {
        assert_eq!(detection_accuracy(&ApRegistry::new(), &HashMap::new()), 1.0);
    }

    #[test]
    fn test_accuracy_counts_matches() {
        let registry = ApRegistry::with_fixed_aps(120_000, 16, 0);
        let mut detectors = HashMap::new();
        for id in registry.ids() {
            let mut detector = ApDetector::new(DetectorConfig::default(), 0);
            // Drive two of six towards evil; all six are legitimate.
            let success = !matches!(id.as_str(), "AP1" | "AP2");
            for _ in 0..20 {
                detector.observe(success, 0);
            }
            detectors.insert(id, detector);
        }
        let accuracy = detection_accuracy(&registry, &detectors);
        assert!((accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_counters_flatten_into_snapshot_json() {
        let json = serde_json::to_value(Counters {
            total_sent: 3,
            ..Counters::default()
        })
        .unwrap();
        assert_eq!(json["totalSent"], 3);
        assert_eq!(json["evilApsDetectedCorrectly"], 0);
    }
}
