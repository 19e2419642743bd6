//! # twinguard-identity
//!
//! Identity and key fabric for TwinGuard access points and devices.
//!
//! Provides:
//! - Per-entity signing and key-exchange keypairs
//! - Payload key derivation between a device and an access point
//! - Validated access point and device identifiers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ids;
pub mod keypair;

pub use error::{IdentityError, Result};
pub use ids::{ApId, DeviceId, MAX_ID_LEN};
pub use keypair::{EntityKeyPair, PublicKeys, PAYLOAD_KEY_CONTEXT};
