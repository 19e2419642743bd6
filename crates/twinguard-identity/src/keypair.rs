//! Per-entity key material for TwinGuard.
//!
//! Every access point and device owns one Ed25519 signing key and one static
//! X25519 key-exchange key, generated at creation and never rotated.
//!
//! ## Security Notes
//!
//! - All private keys implement `Zeroize` for secure memory cleanup
//! - The packet key is derived from the static-static shared secret using
//!   BLAKE3 with a fixed context, so both ends reach the same key without a
//!   handshake

use serde::{Deserialize, Serialize};

use twinguard_crypto::{
    Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, ExchangePublicKey, ExchangeSecret,
    SymmetricKey,
};

use crate::{IdentityError, Result};

/// Key derivation context for packet payload keys. Embeds the protocol salt
/// and label.
pub const PAYLOAD_KEY_CONTEXT: &str = "twinguard wifi-sim-salt ap-payload v1";

/// Key derivation context for public key fingerprints.
const FINGERPRINT_CONTEXT: &str = "twinguard key fingerprint v1";

/// Maximum size of serialized `PublicKeys` in bytes.
///
/// Checked before deserialization so crafted input cannot force a large
/// allocation inside bincode.
pub const MAX_PUBLIC_KEYS_SIZE: usize = 256;

/// Public keys of an access point or device.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeys {
    /// Ed25519 key that verifies packet and beacon signatures.
    pub signing: Ed25519PublicKey,
    /// X25519 key used for payload key agreement.
    pub exchange: ExchangePublicKey,
}

impl PublicKeys {
    /// Short fingerprint over both keys, for logs.
    pub fn fingerprint(&self) -> String {
        let mut material = Vec::with_capacity(64);
        material.extend_from_slice(self.signing.as_bytes());
        material.extend_from_slice(self.exchange.as_bytes());
        let digest = blake3::derive_key(FINGERPRINT_CONTEXT, &material);
        hex::encode(&digest[..8])
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IdentityError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input exceeds [`MAX_PUBLIC_KEYS_SIZE`] or if
    /// deserialization fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PUBLIC_KEYS_SIZE {
            return Err(IdentityError::Encoding(format!(
                "PublicKeys data too large: {} bytes (max: {})",
                bytes.len(),
                MAX_PUBLIC_KEYS_SIZE
            )));
        }
        bincode::deserialize(bytes).map_err(|e| IdentityError::Encoding(e.to_string()))
    }
}

impl std::fmt::Debug for PublicKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeys")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Signing and key-exchange keypairs of one entity.
///
/// # Example
///
/// ```
/// use twinguard_identity::EntityKeyPair;
///
/// let device = EntityKeyPair::generate();
/// let ap = EntityKeyPair::generate();
///
/// let send_key = device.payload_key(&ap.public_keys().exchange);
/// let recv_key = ap.payload_key(&device.public_keys().exchange);
/// assert_eq!(send_key, recv_key);
/// ```
pub struct EntityKeyPair {
    signing: Ed25519KeyPair,
    exchange: ExchangeSecret,
    public_keys: PublicKeys,
}

impl EntityKeyPair {
    /// Generate fresh keys. Treated as infallible: OsRng failure aborts.
    pub fn generate() -> Self {
        let signing = Ed25519KeyPair::generate();
        let exchange = ExchangeSecret::generate();
        let public_keys = PublicKeys {
            signing: signing.public_key(),
            exchange: exchange.public_key(),
        };
        Self {
            signing,
            exchange,
            public_keys,
        }
    }

    /// Public keys for discovery.
    pub fn public_keys(&self) -> &PublicKeys {
        &self.public_keys
    }

    /// Sign `message` with the Ed25519 key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing.sign(message)
    }

    /// Derive the symmetric payload key shared with `peer`.
    pub fn payload_key(&self, peer: &ExchangePublicKey) -> SymmetricKey {
        SymmetricKey::from(self.exchange.derive_shared_key(peer, PAYLOAD_KEY_CONTEXT))
    }
}

impl std::fmt::Debug for EntityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityKeyPair")
            .field("public_keys", &self.public_keys)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_key_agreement() {
        let device = EntityKeyPair::generate();
        let ap = EntityKeyPair::generate();

        assert_eq!(
            device.payload_key(&ap.public_keys().exchange),
            ap.payload_key(&device.public_keys().exchange)
        );
    }

    #[test]
    fn test_payload_key_differs_per_peer() {
        let device = EntityKeyPair::generate();
        let ap1 = EntityKeyPair::generate();
        let ap2 = EntityKeyPair::generate();

        assert_ne!(
            device.payload_key(&ap1.public_keys().exchange),
            device.payload_key(&ap2.public_keys().exchange)
        );
    }

    #[test]
    fn test_signature_verifies_with_public_keys() {
        let entity = EntityKeyPair::generate();
        let sig = entity.sign(b"beacon");
        assert!(entity.public_keys().signing.verify(b"beacon", &sig).is_ok());
    }

    #[test]
    fn test_public_keys_bytes_roundtrip() {
        let keys = EntityKeyPair::generate().public_keys().clone();
        let bytes = keys.to_bytes().unwrap();
        assert_eq!(PublicKeys::from_bytes(&bytes).unwrap(), keys);
    }

    #[test]
    fn test_public_keys_size_limit() {
        let oversized = vec![0u8; MAX_PUBLIC_KEYS_SIZE + 1];
        assert!(matches!(
            PublicKeys::from_bytes(&oversized),
            Err(IdentityError::Encoding(_))
        ));
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = EntityKeyPair::generate();
        let b = EntityKeyPair::generate();
        assert_eq!(a.public_keys().fingerprint(), a.public_keys().fingerprint());
        assert_ne!(a.public_keys().fingerprint(), b.public_keys().fingerprint());
        assert_eq!(a.public_keys().fingerprint().len(), 16);
    }

    #[test]
    fn test_debug_redacted() {
        let entity = EntityKeyPair::generate();
        assert!(format!("{:?}", entity).contains("REDACTED"));
    }
}
