//! # twinguard-crypto
//!
//! Cryptographic primitives for the TwinGuard packet protocol.
//!
//! This crate provides:
//! - **X25519** static key agreement between devices and APs, with
//!   **BLAKE3** deriving the payload key from the shared secret
//! - **XChaCha20-Poly1305** authenticated encryption with a detached tag
//! - **Ed25519** signatures over packet and beacon bytes
//!
//! ## Security
//!
//! All secret data uses `zeroize` for secure memory cleanup.
//! Secret-dependent comparisons use constant-time operations via `subtle`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod exchange;
pub mod signing;
pub mod symmetric;

#[cfg(test)]
mod proptests;

pub use error::{CryptoError, Result};
pub use exchange::{ExchangePublicKey, ExchangeSecret};
pub use signing::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use symmetric::{open, seal, Iv, Sealed, SymmetricKey, Tag, IV_SIZE, KEY_SIZE, TAG_SIZE};
