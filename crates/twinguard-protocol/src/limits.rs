//! Protocol limits and constants.
//!
//! All protocol limits are defined here for consistent enforcement.

// === Timestamps ===

/// Default accepted distance between packet timestamp and receiver clock.
pub const DEFAULT_TOLERANCE_SECS: u64 = 60;

/// Lowest configurable tolerance.
pub const MIN_TOLERANCE_SECS: u64 = 5;

/// Highest configurable tolerance.
pub const MAX_TOLERANCE_SECS: u64 = 300;

// === Replay protection ===

/// Replay window entry lifetime in milliseconds (120 seconds).
pub const REPLAY_TTL_MS: u64 = 120_000;

/// Maximum nonces remembered per access point.
///
/// At the fastest generator tick (20ms) a single device produces 6000
/// packets per TTL, so this bounds memory under a handful of busy devices.
pub const MAX_REPLAY_ENTRIES: usize = 16_384;

/// Random bytes in the nonce suffix.
pub const NONCE_RANDOM_BYTES: usize = 8;

// === Wire ===

/// Maximum encoded packet size accepted by `Packet::from_bytes`.
pub const MAX_PACKET_SIZE: usize = 16 * 1024;

/// Maximum plaintext carried by one packet.
pub const MAX_PLAINTEXT_SIZE: usize = 8 * 1024;
