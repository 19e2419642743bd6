//! XChaCha20-Poly1305 authenticated encryption with a detached tag.
//!
//! Packet bodies carry the IV, ciphertext and tag as separate fields, so the
//! tag is kept out of the ciphertext buffer. The packet header is bound as
//! associated data.
//!
//! ## Security Notes
//!
//! - Keys are zeroized on drop
//! - IVs are randomly generated using OsRng (192 bits, safe for random use)
//! - NEVER reuse an IV with the same key

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of IV in bytes (192 bits for XChaCha20).
pub const IV_SIZE: usize = 24;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A 256-bit symmetric key for XChaCha20-Poly1305 encryption.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random symmetric key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this - avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl From<[u8; KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SymmetricKey {}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// A 192-bit initialization vector for XChaCha20-Poly1305.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a new random IV.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create an IV from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidIvLength {
                expected: IV_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the IV as a byte slice.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }

    /// Mutable access, used by tamper tests and fuzzers.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; IV_SIZE] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for Iv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Iv({:02x}{:02x}..)", self.bytes[0], self.bytes[1])
    }
}

/// A detached Poly1305 authentication tag.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    bytes: [u8; TAG_SIZE],
}

impl Tag {
    /// Create a tag from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TAG_SIZE {
            return Err(CryptoError::InvalidTagLength {
                expected: TAG_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; TAG_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the tag as a byte slice.
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.bytes
    }

    /// Mutable access, used by tamper tests and fuzzers.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; TAG_SIZE] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag({:02x}{:02x}..)", self.bytes[0], self.bytes[1])
    }
}

/// Output of [`seal`]: IV, ciphertext and detached tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    /// The IV used for encryption.
    pub iv: Iv,
    /// The ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// The authentication tag over ciphertext and associated data.
    pub tag: Tag,
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// # Example
///
/// ```
/// use twinguard_crypto::symmetric::{open, seal, SymmetricKey};
///
/// let key = SymmetricKey::generate();
/// let sealed = seal(&key, b"micro-pkt", b"header").unwrap();
/// let opened = open(&key, &sealed, b"header").unwrap();
///
/// assert_eq!(opened, b"micro-pkt");
/// ```
pub fn seal(key: &SymmetricKey, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let iv = Iv::generate();
    let xnonce = XNonce::from_slice(iv.as_bytes());

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(xnonce, aad, &mut buffer)
        .map_err(|_| CryptoError::Encryption("XChaCha20-Poly1305 encryption failed".into()))?;

    Ok(Sealed {
        iv,
        ciphertext: buffer,
        tag: Tag::from_bytes(tag.as_slice())?,
    })
}

/// Decrypt and authenticate a [`Sealed`] payload.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the ciphertext, tag, IV or associated
/// data was altered, or the wrong key is used.
pub fn open(key: &SymmetricKey, sealed: &Sealed, aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let xnonce = XNonce::from_slice(sealed.iv.as_bytes());
    let tag = chacha20poly1305::Tag::from_slice(sealed.tag.as_bytes());

    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(xnonce, aad, &mut buffer, tag)
        .map_err(|_| CryptoError::Decryption)?;
    Ok(buffer)
}
