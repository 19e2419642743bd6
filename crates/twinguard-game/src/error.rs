//! Error types for game model operations.

use thiserror::Error;

/// Errors that can occur while parsing or configuring the game model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Sensitivity mode is neither `non` nor `sensitive`.
    #[error("Unknown sensitivity mode: {0}")]
    UnknownSensitivity(String),

    /// Strategy name is not TRUST, VERIFY or AVOID.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type for game model operations.
pub type Result<T> = std::result::Result<T, GameError>;
