//! Error types for simulation operations.

use thiserror::Error;

use twinguard_identity::ApId;

use crate::config::ConfigError;

/// Errors that can occur while driving the simulation.
///
/// Packet rejections are not errors; they are reported as
/// [`twinguard_protocol::Rejection`] values inside packet events.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Identity error.
    #[error("Identity error: {0}")]
    Identity(#[from] twinguard_identity::IdentityError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] twinguard_protocol::ProtocolError),

    /// Game model error.
    #[error("Game error: {0}")]
    Game(#[from] twinguard_game::GameError),

    /// No access point with this id.
    #[error("Unknown access point: {0}")]
    UnknownAp(ApId),

    /// Command could not be decoded.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The simulation has been shut down.
    #[error("Simulation is shut down")]
    ShutDown,
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, CoreError>;
