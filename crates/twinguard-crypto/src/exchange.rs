//! Static X25519 key agreement between devices and access points.
//!
//! Each end of a packet holds one long-lived exchange secret. The payload key
//! comes from the static-static shared secret, so either side rebuilds it from
//! the peer's published key with no handshake.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

const KEY_SIZE: usize = 32;

/// Published half of an exchange secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangePublicKey([u8; KEY_SIZE]);

impl ExchangePublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Lowercase hex, as shown in trusted-repository views.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for ExchangePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangePublicKey({}..)", hex::encode(&self.0[..4]))
    }
}

/// Long-lived X25519 secret. Zeroized on drop and never cloned.
pub struct ExchangeSecret(StaticSecret);

impl ExchangeSecret {
    /// Fresh secret from the OS RNG.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    /// The half to publish.
    pub fn public_key(&self) -> ExchangePublicKey {
        ExchangePublicKey(PublicKey::from(&self.0).to_bytes())
    }

    /// Agree with `peer` and derive a 32-byte key under `context`.
    ///
    /// The raw shared secret never leaves this call. Both sides get the same
    /// key for the same pair of secrets and context.
    pub fn derive_shared_key(&self, peer: &ExchangePublicKey, context: &str) -> [u8; KEY_SIZE] {
        let shared = self.0.diffie_hellman(&PublicKey::from(peer.0));
        blake3::derive_key(context, shared.as_bytes())
    }
}

impl std::fmt::Debug for ExchangeSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExchangeSecret([REDACTED])")
    }
}
