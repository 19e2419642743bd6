//! Fuzz target for authenticated decryption.
//!
//! Splits the input into IV, tag and ciphertext and opens it under a random
//! key. Forged input must be rejected without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twinguard_crypto::{open, Iv, Sealed, SymmetricKey, Tag, IV_SIZE, TAG_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() < IV_SIZE + TAG_SIZE {
        return;
    }
    let (iv, rest) = data.split_at(IV_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let (Ok(iv), Ok(tag)) = (Iv::from_bytes(iv), Tag::from_bytes(tag)) else {
        return;
    };
    let sealed = Sealed {
        iv,
        ciphertext: ciphertext.to_vec(),
        tag,
    };

    let key = SymmetricKey::generate();
    assert!(open(&key, &sealed, b"").is_err());
});
