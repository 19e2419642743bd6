//! Property-based tests for cryptographic primitives.
//!
//! These tests focus on:
//!
//! - Roundtrip properties (key agreement + seal/open)
//! - Tamper properties (any single flipped byte is rejected)
//! - Signature binding

use proptest::prelude::*;

use crate::{open, seal, Ed25519KeyPair, ExchangeSecret, SymmetricKey, IV_SIZE, TAG_SIZE};

const CONTEXT: &str = "twinguard proptest payload v1";

fn agreed_keys() -> (SymmetricKey, SymmetricKey) {
    let device = ExchangeSecret::generate();
    let ap = ExchangeSecret::generate();
    let sender = device.derive_shared_key(&ap.public_key(), CONTEXT);
    let receiver = ap.derive_shared_key(&device.public_key(), CONTEXT);
    (SymmetricKey::from(sender), SymmetricKey::from(receiver))
}

// ==================== Seal/Open Property Tests ====================

proptest! {
    /// Sealing with the sender's derived key and opening with the receiver's
    /// derived key returns the original plaintext.
    #[test]
    fn derived_keys_roundtrip(
        plaintext: Vec<u8>,
        aad in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let (sender, receiver) = agreed_keys();
        let sealed = seal(&sender, &plaintext, &aad).unwrap();
        let opened = open(&receiver, &sealed, &aad).unwrap();
        prop_assert_eq!(plaintext, opened);
    }

    /// Flipping any single ciphertext byte makes opening fail.
    #[test]
    fn ciphertext_flip_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SymmetricKey::generate();
        let mut sealed = seal(&key, &plaintext, b"hdr").unwrap();
        let i = index.index(sealed.ciphertext.len());
        sealed.ciphertext[i] ^= 1 << bit;
        prop_assert!(open(&key, &sealed, b"hdr").is_err());
    }

    /// Flipping any single tag byte makes opening fail.
    #[test]
    fn tag_flip_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 0..64),
        i in 0usize..TAG_SIZE,
        mask in 1u8..=255,
    ) {
        let key = SymmetricKey::generate();
        let mut sealed = seal(&key, &plaintext, b"hdr").unwrap();
        sealed.tag.as_bytes_mut()[i] ^= mask;
        prop_assert!(open(&key, &sealed, b"hdr").is_err());
    }

    /// Flipping any single IV byte makes opening fail.
    #[test]
    fn iv_flip_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 0..64),
        i in 0usize..IV_SIZE,
        mask in 1u8..=255,
    ) {
        let key = SymmetricKey::generate();
        let mut sealed = seal(&key, &plaintext, b"hdr").unwrap();
        sealed.iv.as_bytes_mut()[i] ^= mask;
        prop_assert!(open(&key, &sealed, b"hdr").is_err());
    }

    /// Flipping any single associated-data (header) byte makes opening fail.
    #[test]
    fn header_flip_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 0..64),
        header in prop::collection::vec(any::<u8>(), 1..128),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let key = SymmetricKey::generate();
        let sealed = seal(&key, &plaintext, &header).unwrap();
        let mut tampered = header.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= mask;
        prop_assert!(open(&key, &sealed, &tampered).is_err());
    }

    /// Different key pairs never derive the same packet key.
    #[test]
    fn unrelated_pairs_cannot_open(plaintext in prop::collection::vec(any::<u8>(), 1..64)) {
        let (sender, _) = agreed_keys();
        let (_, stranger) = agreed_keys();
        let sealed = seal(&sender, &plaintext, b"").unwrap();
        prop_assert!(open(&stranger, &sealed, b"").is_err());
    }
}

// ==================== Signature Property Tests ====================

proptest! {
    /// A signature verifies only for the exact message it was made over.
    #[test]
    fn signature_bound_to_message(
        message in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let keypair = Ed25519KeyPair::generate();
        let sig = keypair.sign(&message);
        prop_assert!(keypair.public_key().verify(&message, &sig).is_ok());

        let mut altered = message.clone();
        let i = index.index(altered.len());
        altered[i] ^= mask;
        prop_assert!(keypair.public_key().verify(&altered, &sig).is_err());
    }
}
