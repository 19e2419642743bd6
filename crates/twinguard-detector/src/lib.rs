//! # twinguard-detector
//!
//! Per-access-point Bayesian evil-twin detection.
//!
//! This crate provides:
//! - **ApDetector**: log-odds estimator fed with protocol outcomes
//! - **DecayConfig**: exponential forgetting between observations
//! - **ObservationWindow**: last 100 outcomes, for progress reporting
//!
//! Detectors never see ground truth. They start from the same prior for
//! every access point and move only on observed packet outcomes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bayes;
pub mod decay;
pub mod window;

pub use bayes::{ApDetector, DetectorConfig, DEFAULT_EVIL_THRESHOLD, DEFAULT_PRIOR_EVIL};
pub use decay::DecayConfig;
pub use window::{Observation, ObservationWindow, WindowProgress};
