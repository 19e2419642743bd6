//! Error types for identity operations.

use thiserror::Error;

/// Errors that can occur during identity operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] twinguard_crypto::CryptoError),

    /// Identifier failed validation.
    #[error("Invalid {kind} id: {reason}")]
    InvalidId {
        /// Which identifier kind was rejected.
        kind: &'static str,
        /// Reason for invalidity.
        reason: String,
    },

    /// Public key bundle could not be encoded or decoded.
    #[error("Key encoding failed: {0}")]
    Encoding(String),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
