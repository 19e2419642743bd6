//! Payoff matrices, risk parameters and per-packet pricing.
//!
//! A [`SensitivityProfile`] bundles everything that depends on the data
//! sensitivity mode. Callers hold it behind one shared reference and swap the
//! whole profile on a mode change, so a single pricing call never mixes two
//! modes.

use serde::{Deserialize, Serialize};

use crate::strategy::{Outcome, Strategy};
use crate::{GameError, Result};

/// Data sensitivity mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Ordinary traffic.
    #[default]
    Non,
    /// Sensitive traffic, breaches cost more.
    Sensitive,
}

impl Sensitivity {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Sensitivity::Non => "non",
            Sensitivity::Sensitive => "sensitive",
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "non" => Ok(Sensitivity::Non),
            "sensitive" => Ok(Sensitivity::Sensitive),
            _ => Err(GameError::UnknownSensitivity(s.to_string())),
        }
    }
}

/// One cell of the payoff matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payoff {
    /// Device utility.
    pub device: f64,
    /// AP utility.
    pub ap: f64,
    /// Cost charged to the population.
    pub cost: f64,
}

impl Payoff {
    const fn new(device: f64, ap: f64, cost: f64) -> Self {
        Self { device, ap, cost }
    }
}

/// Payoffs for every (strategy, outcome) pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PayoffMatrix {
    /// TRUST against a legitimate AP.
    pub trust_cooperate: Payoff,
    /// TRUST against a malicious AP.
    pub trust_defect: Payoff,
    /// VERIFY against a legitimate AP.
    pub verify_cooperate: Payoff,
    /// VERIFY against a malicious AP.
    pub verify_defect: Payoff,
    /// AVOID against a legitimate AP.
    pub avoid_cooperate: Payoff,
    /// AVOID against a malicious AP.
    pub avoid_defect: Payoff,
}

impl PayoffMatrix {
    /// Matrix for ordinary traffic.
    pub const NON: PayoffMatrix = PayoffMatrix {
        trust_cooperate: Payoff::new(10.0, 5.0, 1.0),
        trust_defect: Payoff::new(-50.0, 40.0, 45.0),
        verify_cooperate: Payoff::new(8.0, 4.0, 1.4),
        verify_defect: Payoff::new(-5.0, -10.0, 2.5),
        avoid_cooperate: Payoff::new(3.0, -2.0, 3.2),
        avoid_defect: Payoff::new(5.0, -5.0, 4.0),
    };

    /// Matrix for sensitive traffic.
    pub const SENSITIVE: PayoffMatrix = PayoffMatrix {
        trust_cooperate: Payoff::new(9.0, 5.0, 1.2),
        trust_defect: Payoff::new(-120.0, 60.0, 120.0),
        verify_cooperate: Payoff::new(7.0, 4.0, 1.8),
        verify_defect: Payoff::new(-20.0, -15.0, 4.0),
        avoid_cooperate: Payoff::new(2.0, -3.0, 4.5),
        avoid_defect: Payoff::new(4.0, -7.0, 7.0),
    };

    /// Cell for `strategy` against `outcome`.
    pub fn get(&self, strategy: Strategy, outcome: Outcome) -> Payoff {
        match (strategy, outcome) {
            (Strategy::Trust, Outcome::Cooperate) => self.trust_cooperate,
            (Strategy::Trust, Outcome::Defect) => self.trust_defect,
            (Strategy::Verify, Outcome::Cooperate) => self.verify_cooperate,
            (Strategy::Verify, Outcome::Defect) => self.verify_defect,
            (Strategy::Avoid, Outcome::Cooperate) => self.avoid_cooperate,
            (Strategy::Avoid, Outcome::Defect) => self.avoid_defect,
        }
    }

    /// Every cost in the matrix.
    pub fn costs(&self) -> [f64; 6] {
        [
            self.trust_cooperate.cost,
            self.trust_defect.cost,
            self.verify_cooperate.cost,
            self.verify_defect.cost,
            self.avoid_cooperate.cost,
            self.avoid_defect.cost,
        ]
    }
}

/// Tail-risk shape parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Risk aversion scale.
    pub alpha: f64,
    /// Loss exponent.
    pub beta: f64,
    /// Tail weight.
    pub tail: f64,
}

/// Breach-related parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityParams {
    /// Breach rate.
    pub lambda: f64,
    /// Penalty per breach.
    pub breach_penalty: f64,
    /// Fraction of breach cost removed by verification.
    pub verify_mitigation: f64,
}

/// Everything that changes with the sensitivity mode, swapped as one unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    /// Mode these values belong to.
    pub mode: Sensitivity,
    /// Payoff matrix.
    pub matrix: PayoffMatrix,
    /// Risk parameters.
    pub risk: RiskParams,
    /// Breach parameters.
    pub params: SensitivityParams,
}

impl SensitivityProfile {
    /// Fixed profile for `mode`.
    pub fn for_mode(mode: Sensitivity) -> Self {
        match mode {
            Sensitivity::Non => Self {
                mode,
                matrix: PayoffMatrix::NON,
                risk: RiskParams {
                    alpha: 1.0,
                    beta: 1.3,
                    tail: 8.0,
                },
                params: SensitivityParams {
                    lambda: 0.035,
                    breach_penalty: 35.0,
                    verify_mitigation: 0.90,
                },
            },
            Sensitivity::Sensitive => Self {
                mode,
                matrix: PayoffMatrix::SENSITIVE,
                risk: RiskParams {
                    alpha: 2.0,
                    beta: 1.6,
                    tail: 16.0,
                },
                params: SensitivityParams {
                    lambda: 0.080,
                    breach_penalty: 75.0,
                    verify_mitigation: 0.95,
                },
            },
        }
    }

    /// Price one packet under this profile. See [`price_packet`].
    pub fn price(&self, strategy: Strategy, actually_malicious: bool, pre_avoided: bool) -> Pricing {
        price_packet(&self.matrix, strategy, actually_malicious, pre_avoided)
    }
}

impl Default for SensitivityProfile {
    fn default() -> Self {
        Self::for_mode(Sensitivity::Non)
    }
}

/// Result of pricing one packet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Cost charged.
    pub cost: f64,
    /// Matrix column the cost came from.
    pub outcome: Outcome,
    /// Destination was already in the avoided set under AVOID.
    pub avoided: bool,
    /// The cost model counts this packet as not delivered, whatever the
    /// protocol said.
    pub dropped: bool,
}

/// Table-driven cost of one packet.
///
/// Depends on the destination's actual legitimacy, not on whether the
/// protocol caught it:
///
/// - TRUST and VERIFY charge the defect cost for a malicious destination and
///   the cooperate cost otherwise.
/// - AVOID charges the defect cost when the destination was pre-emptively
///   avoided or when an undetected malicious AP was still chosen.
pub fn price_packet(
    matrix: &PayoffMatrix,
    strategy: Strategy,
    actually_malicious: bool,
    pre_avoided: bool,
) -> Pricing {
    let avoided = strategy == Strategy::Avoid && pre_avoided;
    let outcome = if avoided {
        Outcome::Defect
    } else {
        Outcome::from_malicious(actually_malicious)
    };
    Pricing {
        cost: matrix.get(strategy, outcome).cost,
        outcome,
        avoided,
        dropped: outcome == Outcome::Defect,
    }
}
