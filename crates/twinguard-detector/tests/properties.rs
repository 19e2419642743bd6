//! Property tests for detector belief updates.

use proptest::prelude::*;

use twinguard_detector::bayes::{POSTERIOR_MAX, POSTERIOR_MIN};
use twinguard_detector::{ApDetector, DetectorConfig};

proptest! {
    /// The posterior never leaves the clamp interval.
    #[test]
    fn posterior_stays_clamped(steps in prop::collection::vec((any::<bool>(), 0u64..120_000), 1..300)) {
        let mut detector = ApDetector::new(DetectorConfig::default(), 0);
        let mut now = 0u64;
        for (success, gap) in steps {
            now += gap;
            let p = detector.observe(success, now);
            prop_assert!((POSTERIOR_MIN..=POSTERIOR_MAX).contains(&p));
        }
    }

    /// A failure never lowers belief and a success never raises it, when
    /// both are observed without an idle gap.
    #[test]
    fn outcomes_move_belief_monotonically(history in prop::collection::vec(any::<bool>(), 0..40), success: bool) {
        let mut detector = ApDetector::new(DetectorConfig::default(), 0);
        for outcome in history {
            detector.observe(outcome, 0);
        }
        let before = detector.posterior();
        let after = detector.observe(success, 0);
        if success {
            prop_assert!(after <= before);
        } else {
            prop_assert!(after >= before);
        }
    }

    /// Evidence separated by a long idle gap carries less weight than the
    /// same evidence observed back to back.
    #[test]
    fn idle_gap_shrinks_log_odds(gap_secs in 120u64..3_600) {
        let config = DetectorConfig::default();

        let mut back_to_back = ApDetector::new(config, 0);
        back_to_back.observe(false, 0);
        back_to_back.observe(false, 0);

        let mut gapped = ApDetector::new(config, 0);
        gapped.observe(false, 0);
        gapped.observe(false, gap_secs * 1000);

        let undamped = 2.0 * config.log_likelihood_ratio(false);
        prop_assert!(gapped.log_odds().abs() < undamped);
        prop_assert!(gapped.log_odds() < back_to_back.log_odds());
    }
}
