//! Defensive strategies and AP behaviour outcomes.

use serde::{Deserialize, Serialize};

use crate::{GameError, Result};

/// Population-wide defensive posture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// Send to any AP without extra checks.
    Trust,
    /// Send to any AP and verify the exchange.
    Verify,
    /// Route around APs the detector suspects.
    Avoid,
}

impl Strategy {
    /// Rotation order.
    pub const ALL: [Strategy; 3] = [Strategy::Trust, Strategy::Verify, Strategy::Avoid];

    /// Successor in the TRUST → VERIFY → AVOID → TRUST cycle.
    pub fn next(self) -> Self {
        match self {
            Strategy::Trust => Strategy::Verify,
            Strategy::Verify => Strategy::Avoid,
            Strategy::Avoid => Strategy::Trust,
        }
    }

    /// Upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Trust => "TRUST",
            Strategy::Verify => "VERIFY",
            Strategy::Avoid => "AVOID",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TRUST" => Ok(Strategy::Trust),
            "VERIFY" => Ok(Strategy::Verify),
            "AVOID" => Ok(Strategy::Avoid),
            _ => Err(GameError::UnknownStrategy(s.to_string())),
        }
    }
}

/// How the AP on the other end behaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Legitimate AP.
    Cooperate,
    /// Malicious AP.
    Defect,
}

impl Outcome {
    /// Outcome implied by ground truth.
    pub fn from_malicious(malicious: bool) -> Self {
        if malicious {
            Outcome::Defect
        } else {
            Outcome::Cooperate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle() {
        assert_eq!(Strategy::Trust.next(), Strategy::Verify);
        assert_eq!(Strategy::Verify.next(), Strategy::Avoid);
        assert_eq!(Strategy::Avoid.next(), Strategy::Trust);
    }

    #[test]
    fn test_parse() {
        assert_eq!("verify".parse::<Strategy>().unwrap(), Strategy::Verify);
        assert_eq!("AVOID".parse::<Strategy>().unwrap(), Strategy::Avoid);
        assert!("flee".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Strategy::Trust).unwrap(), "\"TRUST\"");
        assert_eq!(serde_json::to_string(&Outcome::Defect).unwrap(), "\"defect\"");
    }
}
