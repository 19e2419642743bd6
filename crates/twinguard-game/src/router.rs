//! Advisory per-AP strategy selection.
//!
//! For belief `p` that an AP is evil, the expected device payoff of a
//! strategy is `(1 - p) * cooperate + p * defect`. The router picks the
//! maximum, breaking exact ties VERIFY > AVOID > TRUST.
//!
//! Decisions are analytics only. Actual routing follows the globally
//! scheduled strategy in [`crate::schedule`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use twinguard_identity::ApId;

use crate::payoff::PayoffMatrix;
use crate::strategy::{Outcome, Strategy};

/// Expected device payoff per strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedPayoffs {
    /// TRUST.
    pub trust: f64,
    /// VERIFY.
    pub verify: f64,
    /// AVOID.
    pub avoid: f64,
}

/// Router output for one AP.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    /// Strategy with the highest expected payoff.
    pub strategy: Strategy,
    /// Belief the decision was made from.
    pub evil_prob: f64,
    /// All three expectations.
    pub expected: ExpectedPayoffs,
}

fn expected(matrix: &PayoffMatrix, strategy: Strategy, p: f64) -> f64 {
    (1.0 - p) * matrix.get(strategy, Outcome::Cooperate).device
        + p * matrix.get(strategy, Outcome::Defect).device
}

/// Best strategy against an AP believed evil with probability `evil_prob`.
pub fn optimal_strategy(matrix: &PayoffMatrix, evil_prob: f64) -> RouterDecision {
    let p = evil_prob.clamp(0.0, 1.0);
    let payoffs = ExpectedPayoffs {
        trust: expected(matrix, Strategy::Trust, p),
        verify: expected(matrix, Strategy::Verify, p),
        avoid: expected(matrix, Strategy::Avoid, p),
    };

    let max = payoffs.trust.max(payoffs.verify).max(payoffs.avoid);
    let strategy = if payoffs.verify == max {
        Strategy::Verify
    } else if payoffs.avoid == max {
        Strategy::Avoid
    } else {
        Strategy::Trust
    };

    RouterDecision {
        strategy,
        evil_prob: p,
        expected: payoffs,
    }
}

/// Keeps the most recent decision per AP.
#[derive(Clone, Debug, Default)]
pub struct NashRouter {
    history: BTreeMap<ApId, RouterDecision>,
}

impl NashRouter {
    /// Empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide for every `(ap, belief)` pair, remember and return the results.
    pub fn compute<'a, I>(&mut self, beliefs: I, matrix: &PayoffMatrix) -> BTreeMap<ApId, RouterDecision>
    where
        I: IntoIterator<Item = (&'a ApId, f64)>,
    {
        let decisions: BTreeMap<ApId, RouterDecision> = beliefs
            .into_iter()
            .map(|(id, p)| (id.clone(), optimal_strategy(matrix, p)))
            .collect();
        for (id, decision) in &decisions {
            self.history.insert(id.clone(), *decision);
        }
        decisions
    }

    /// Last decision made for `ap`.
    pub fn last(&self, ap: &ApId) -> Option<&RouterDecision> {
        self.history.get(ap)
    }

    /// All remembered decisions.
    pub fn history(&self) -> &BTreeMap<ApId, RouterDecision> {
        &self.history
    }

    /// Forget a removed AP.
    pub fn forget(&mut self, ap: &ApId) {
        self.history.remove(ap);
    }
}
