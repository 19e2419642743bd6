//! Error types for protocol operations.
//!
//! [`ProtocolError`] covers faults while building or decoding packets.
//! [`Rejection`] is the outcome of a failed verification: ordinary data the
//! caller turns into a cost event and a detector observation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] twinguard_crypto::CryptoError),

    /// Identity error.
    #[error("Identity error: {0}")]
    Identity(#[from] twinguard_identity::IdentityError),

    /// Wire encoding or decoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encoded packet exceeds the wire limit.
    #[error("Packet too large: max {max} bytes, got {actual}")]
    PacketTooLarge {
        /// Maximum allowed size.
        max: usize,
        /// Actual size.
        actual: usize,
    },

    /// Plaintext exceeds the per-packet limit.
    #[error("Plaintext too large: max {max} bytes, got {actual}")]
    PlaintextTooLarge {
        /// Maximum allowed size.
        max: usize,
        /// Actual size.
        actual: usize,
    },

    /// Nonce string is not `<timestamp>:<hex>`.
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    /// Beacon signature did not verify.
    #[error("Beacon signature invalid for {ap}")]
    InvalidBeacon {
        /// Access point the beacon claimed to come from.
        ap: String,
    },
}

impl From<bincode::Error> for ProtocolError {
    fn from(e: bincode::Error) -> Self {
        ProtocolError::Encoding(e.to_string())
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Reason a packet was rejected at the receiving access point.
///
/// Variants are listed in check order; the first failing check wins.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Destination id is not registered.
    #[error("dest not found")]
    DestNotFound,

    /// Packet timestamp is outside the tolerance window.
    #[error("stale timestamp")]
    StaleTimestamp,

    /// Destination is neither in the trusted repository nor marked legitimate.
    #[error("untrusted AP")]
    UntrustedAp,

    /// Signature does not verify against the sender-claimed key.
    #[error("bad signature")]
    BadSignature,

    /// Nonce was already seen within the replay TTL.
    #[error("replay detected")]
    ReplayDetected,

    /// Authenticated decryption failed.
    #[error("decrypt failed")]
    DecryptFailed,
}

impl Rejection {
    /// All rejection reasons, in check order.
    pub const ALL: [Rejection; 6] = [
        Rejection::DestNotFound,
        Rejection::StaleTimestamp,
        Rejection::UntrustedAp,
        Rejection::BadSignature,
        Rejection::ReplayDetected,
        Rejection::DecryptFailed,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_reason_strings() {
        let reasons: Vec<String> = Rejection::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            reasons,
            vec![
                "dest not found",
                "stale timestamp",
                "untrusted AP",
                "bad signature",
                "replay detected",
                "decrypt failed",
            ]
        );
    }

    #[test]
    fn test_rejection_serializes_snake_case() {
        let json = serde_json::to_string(&Rejection::ReplayDetected).unwrap();
        assert_eq!(json, "\"replay_detected\"");
    }
}
