//! Signed access point beacons.
//!
//! Each access point periodically announces `{id, timestamp, load}` signed
//! with its Ed25519 key, so observers can check the beacon against the key
//! listed in discovery.

use serde::{Deserialize, Serialize};

use twinguard_crypto::{Ed25519PublicKey, Ed25519Signature};
use twinguard_identity::{ApId, EntityKeyPair};

use crate::domain_separation::{build_domain_label, purposes};
use crate::{ProtocolError, Result};

/// A signed beacon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Announcing access point.
    pub ap: ApId,
    /// Unix milliseconds.
    pub timestamp_ms: u64,
    /// Current load units.
    pub load: u32,
    /// Signature over the three fields above.
    pub signature: Ed25519Signature,
}

fn beacon_message(ap: &ApId, timestamp_ms: u64, load: u32) -> Result<Vec<u8>> {
    let body = bincode::serialize(&(ap, timestamp_ms, load))?;
    Ok(build_domain_label(purposes::BEACON_SIG, &body))
}

impl Beacon {
    /// Sign a beacon for `ap`.
    pub fn sign(keys: &EntityKeyPair, ap: ApId, timestamp_ms: u64, load: u32) -> Result<Self> {
        let message = beacon_message(&ap, timestamp_ms, load)?;
        Ok(Self {
            signature: keys.sign(&message),
            ap,
            timestamp_ms,
            load,
        })
    }

    /// Check the signature against `signer`.
    pub fn verify(&self, signer: &Ed25519PublicKey) -> Result<()> {
        let message = beacon_message(&self.ap, self.timestamp_ms, self.load)?;
        signer
            .verify(&message, &self.signature)
            .map_err(|_| ProtocolError::InvalidBeacon {
                ap: self.ap.to_string(),
            })
    }
}
