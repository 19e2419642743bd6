//! Receiver-side packet verification.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. destination registered
//! 2. timestamp within tolerance
//! 3. destination trusted (repository or locally legitimate)
//! 4. signature against the sender-claimed key
//! 5. nonce not replayed (window pruned first)
//! 6. authenticated decryption
//!
//! Step 4 proves integrity relative to the key carried in the header. It does
//! not authenticate the device: anyone can claim any id with fresh keys.
//!
//! The nonce is not covered by the signature. A captured packet resent with a
//! fresh nonce passes step 5, so replay protection only holds against
//! byte-identical resubmission. The timestamp tolerance still bounds how long
//! such a copy is accepted.

use twinguard_crypto::open;
use twinguard_identity::{ApId, EntityKeyPair};

use crate::error::Rejection;
use crate::packet::{signing_message, Packet};
use crate::replay::ReplayWindow;
use crate::time::Tolerance;

/// Mutable view of the access point a packet is addressed to.
pub struct Receiver<'a> {
    /// The access point's keys.
    pub keys: &'a EntityKeyPair,
    /// The access point's replay window.
    pub replay: &'a mut ReplayWindow,
    /// Listed in the trusted-legitimate repository.
    pub in_trusted_repo: bool,
    /// Locally flagged legitimate.
    pub marked_legitimate: bool,
}

/// Lookup of packet destinations by id.
pub trait ApDirectory {
    /// Borrow the receiver state for `id`, if registered.
    fn receiver(&mut self, id: &ApId) -> Option<Receiver<'_>>;
}

/// Verify and decrypt `packet` at its destination.
///
/// Returns the plaintext, or the first [`Rejection`] encountered.
pub fn verify_packet<D: ApDirectory + ?Sized>(
    directory: &mut D,
    packet: &Packet,
    tolerance: Tolerance,
    now_ms: u64,
) -> Result<Vec<u8>, Rejection> {
    let header = &packet.header;

    let mut receiver = directory
        .receiver(&header.destination)
        .ok_or(Rejection::DestNotFound)?;

    if !tolerance.accepts(header.timestamp_ms, now_ms) {
        return Err(Rejection::StaleTimestamp);
    }

    if !receiver.in_trusted_repo && !receiver.marked_legitimate {
        return Err(Rejection::UntrustedAp);
    }

    let header_bytes = header.to_bytes().map_err(|_| Rejection::BadSignature)?;
    let message = signing_message(&header_bytes, &packet.body.sealed.ciphertext);
    header
        .sender_keys
        .signing
        .verify(&message, &packet.signature)
        .map_err(|_| Rejection::BadSignature)?;

    receiver.replay.prune(now_ms);
    if !receiver.replay.check_and_insert(&packet.body.nonce, now_ms) {
        return Err(Rejection::ReplayDetected);
    }

    let key = receiver.keys.payload_key(&header.sender_keys.exchange);
    open(&key, &packet.body.sealed, &header_bytes).map_err(|_| Rejection::DecryptFailed)
}
