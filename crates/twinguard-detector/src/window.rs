//! Bounded record of recent outcomes, used for progress reporting only.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of outcomes retained.
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// One observed protocol outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the packet verified and decrypted.
    pub success: bool,
    /// When it was observed, Unix milliseconds.
    pub at_ms: u64,
}

/// Fill level of an [`ObservationWindow`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowProgress {
    /// Outcomes currently held.
    pub current: usize,
    /// Capacity.
    pub target: usize,
    /// `current / target * 100`.
    pub percentage: f64,
}

/// FIFO window of the last `capacity` outcomes, with lifetime counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObservationWindow {
    outcomes: VecDeque<Observation>,
    capacity: usize,
    successes: u64,
    failures: u64,
}

impl Default for ObservationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl ObservationWindow {
    /// Empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            successes: 0,
            failures: 0,
        }
    }

    /// Record an outcome, evicting the oldest when full.
    pub fn push(&mut self, observation: Observation) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        if observation.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.outcomes.push_back(observation);
    }

    /// Outcomes currently held.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no outcomes are held.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Fill level.
    pub fn progress(&self) -> WindowProgress {
        WindowProgress {
            current: self.outcomes.len(),
            target: self.capacity,
            percentage: self.outcomes.len() as f64 / self.capacity as f64 * 100.0,
        }
    }

    /// Lifetime success count.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Lifetime failure count.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Held outcomes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.outcomes.iter()
    }
}
