//! # twinguard-protocol
//!
//! Secure packet protocol between devices and access points.
//!
//! This crate provides:
//! - **Packet**: signed, encrypted, replay-protected device-to-AP packet
//! - **verify_packet**: ordered receiver-side checks yielding a [`Rejection`]
//! - **ReplayWindow**: lazily pruned per-AP nonce memory
//! - **Beacon**: signed periodic AP announcement
//!
//! ## Limitation
//!
//! Signatures verify against the public key carried in the packet header.
//! This shows the packet was not altered after signing; it does not bind the
//! sender id to a key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod beacon;
pub mod domain_separation;
pub mod error;
pub mod limits;
pub mod packet;
pub mod replay;
pub mod time;
pub mod verify;

pub use beacon::Beacon;
pub use error::{ProtocolError, Rejection, Result};
pub use packet::{Nonce, Packet, PacketBody, PacketHeader};
pub use replay::ReplayWindow;
pub use time::Tolerance;
pub use verify::{verify_packet, ApDirectory, Receiver};
