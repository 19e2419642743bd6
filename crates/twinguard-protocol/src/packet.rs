//! Packet format and sender-side construction.
//!
//! ```text
//! Packet
//! ├── header     { sender, destination, timestamp_ms, sender_keys }
//! ├── body       { iv, ciphertext, tag, nonce }
//! └── signature  Ed25519 over label(PACKET-SIG, header) || ciphertext
//! ```
//!
//! The header is encoded with bincode and used both as AEAD associated data
//! and as signed context, so any header change breaks decryption and the
//! signature. The nonce travels outside the signature and is only consulted by
//! the replay window.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use twinguard_crypto::{seal, Ed25519Signature, ExchangePublicKey, Sealed};
use twinguard_identity::{ApId, DeviceId, EntityKeyPair, PublicKeys};

use crate::domain_separation::{build_domain_label, purposes};
use crate::limits::{MAX_PACKET_SIZE, MAX_PLAINTEXT_SIZE, NONCE_RANDOM_BYTES};
use crate::{ProtocolError, Result};

/// Replay nonce, rendered as `<timestamp>:<random hex>`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce {
    timestamp_ms: u64,
    random: [u8; NONCE_RANDOM_BYTES],
}

impl Nonce {
    /// Fresh nonce stamped with `timestamp_ms`.
    pub fn generate<R: RngCore + ?Sized>(timestamp_ms: u64, rng: &mut R) -> Self {
        let mut random = [0u8; NONCE_RANDOM_BYTES];
        rng.fill_bytes(&mut random);
        Self {
            timestamp_ms,
            random,
        }
    }

    /// Timestamp prefix.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.timestamp_ms, hex::encode(self.random))
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", self)
    }
}

impl std::str::FromStr for Nonce {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let (ts, rand_hex) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidNonce(s.to_string()))?;
        let timestamp_ms = ts
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidNonce(s.to_string()))?;
        let bytes = hex::decode(rand_hex).map_err(|_| ProtocolError::InvalidNonce(s.to_string()))?;
        let random: [u8; NONCE_RANDOM_BYTES] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidNonce(s.to_string()))?;
        Ok(Self {
            timestamp_ms,
            random,
        })
    }
}

/// Cleartext packet header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Sending device.
    pub sender: DeviceId,
    /// Destination access point.
    pub destination: ApId,
    /// Send time, Unix milliseconds.
    pub timestamp_ms: u64,
    /// Keys the sender claims as its own. Not bound to the sender id.
    pub sender_keys: PublicKeys,
}

impl PacketHeader {
    /// Canonical bytes used as associated data and signed context.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Encrypted packet body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketBody {
    /// IV, ciphertext and detached tag.
    pub sealed: Sealed,
    /// Replay nonce.
    pub nonce: Nonce,
}

/// A signed, encrypted packet from a device to an access point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Cleartext header.
    pub header: PacketHeader,
    /// Encrypted body.
    pub body: PacketBody,
    /// Signature over header and ciphertext.
    pub signature: Ed25519Signature,
}

/// Bytes covered by the packet signature.
pub(crate) fn signing_message(header_bytes: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut message = build_domain_label(purposes::PACKET_SIG, header_bytes);
    message.extend_from_slice(ciphertext);
    message
}

impl Packet {
    /// Build a packet from `sender` to the access point owning
    /// `destination_exchange`.
    ///
    /// Derives the payload key from the static shared secret, encrypts
    /// `plaintext` with the header as associated data, signs header and
    /// ciphertext, and attaches a nonce stamped with `now_ms`.
    pub fn seal<R: RngCore + ?Sized>(
        sender: &EntityKeyPair,
        sender_id: DeviceId,
        destination: ApId,
        destination_exchange: &ExchangePublicKey,
        plaintext: &[u8],
        now_ms: u64,
        rng: &mut R,
    ) -> Result<Self> {
        if plaintext.len() > MAX_PLAINTEXT_SIZE {
            return Err(ProtocolError::PlaintextTooLarge {
                max: MAX_PLAINTEXT_SIZE,
                actual: plaintext.len(),
            });
        }

        let header = PacketHeader {
            sender: sender_id,
            destination,
            timestamp_ms: now_ms,
            sender_keys: sender.public_keys().clone(),
        };
        let header_bytes = header.to_bytes()?;

        let key = sender.payload_key(destination_exchange);
        let sealed = seal(&key, plaintext, &header_bytes)?;
        let signature = sender.sign(&signing_message(&header_bytes, &sealed.ciphertext));

        Ok(Self {
            header,
            body: PacketBody {
                sealed,
                nonce: Nonce::generate(now_ms, rng),
            },
            signature,
        })
    }

    /// Encode for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from the wire.
    ///
    /// # Errors
    ///
    /// Returns `PacketTooLarge` before touching bincode if the input exceeds
    /// [`MAX_PACKET_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::PacketTooLarge {
                max: MAX_PACKET_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use twinguard_crypto::open;

    fn fixture() -> (EntityKeyPair, EntityKeyPair, Packet) {
        let device = EntityKeyPair::generate();
        let ap = EntityKeyPair::generate();
        let mut rng = StdRng::seed_from_u64(7);
        let packet = Packet::seal(
            &device,
            DeviceId::new("dev1").unwrap(),
            ApId::new("AP1").unwrap(),
            &ap.public_keys().exchange,
            b"micro-pkt",
            1_700_000_000_000,
            &mut rng,
        )
        .unwrap();
        (device, ap, packet)
    }

    #[test]
    fn test_seal_populates_header() {
        let (device, _, packet) = fixture();
        assert_eq!(packet.header.sender.as_str(), "dev1");
        assert_eq!(packet.header.destination.as_str(), "AP1");
        assert_eq!(packet.header.timestamp_ms, 1_700_000_000_000);
        assert_eq!(&packet.header.sender_keys, device.public_keys());
        assert_eq!(packet.body.nonce.timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_receiver_can_open_with_header_aad() {
        let (device, ap, packet) = fixture();
        let key = ap.payload_key(&device.public_keys().exchange);
        let header_bytes = packet.header.to_bytes().unwrap();
        assert_eq!(open(&key, &packet.body.sealed, &header_bytes).unwrap(), b"micro-pkt");
    }

    #[test]
    fn test_signature_covers_header_and_ciphertext() {
        let (device, _, packet) = fixture();
        let header_bytes = packet.header.to_bytes().unwrap();
        let message = signing_message(&header_bytes, &packet.body.sealed.ciphertext);
        assert!(device
            .public_keys()
            .signing
            .verify(&message, &packet.signature)
            .is_ok());
    }

    #[test]
    fn test_wire_roundtrip() {
        let (_, _, packet) = fixture();
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_oversized_wire_input_rejected() {
        let bytes = vec![0u8; MAX_PACKET_SIZE + 1];
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(ProtocolError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let device = EntityKeyPair::generate();
        let ap = EntityKeyPair::generate();
        let result = Packet::seal(
            &device,
            DeviceId::new("dev1").unwrap(),
            ApId::new("AP1").unwrap(),
            &ap.public_keys().exchange,
            &vec![0u8; MAX_PLAINTEXT_SIZE + 1],
            0,
            &mut rand::thread_rng(),
        );
        assert!(matches!(result, Err(ProtocolError::PlaintextTooLarge { .. })));
    }

    #[test]
    fn test_nonce_display_and_parse() {
        let mut rng = StdRng::seed_from_u64(1);
        let nonce = Nonce::generate(1234, &mut rng);
        let text = nonce.to_string();
        assert!(text.starts_with("1234:"));
        assert_eq!(text.len(), "1234:".len() + NONCE_RANDOM_BYTES * 2);
        assert_eq!(text.parse::<Nonce>().unwrap(), nonce);
    }

    #[test]
    fn test_nonce_parse_rejects_garbage() {
        assert!("no-colon".parse::<Nonce>().is_err());
        assert!("abc:00".parse::<Nonce>().is_err());
        assert!("12:zz".parse::<Nonce>().is_err());
        assert!("12:00ff".parse::<Nonce>().is_err());
    }
}
