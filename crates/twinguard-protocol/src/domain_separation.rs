//! Structured domain separation for TwinGuard signatures.
//!
//! Every signed message is prefixed with:
//! `"TWINGUARD-v1." || purpose || "." || context_length || context`
//!
//! so a packet signature can never be replayed as a beacon signature.

const PREFIX: &[u8] = b"TWINGUARD-v1.";

/// Build a domain-separated label.
///
/// Format: `"TWINGUARD-v1." || purpose || "." || len(context) as 4-byte BE || context`
///
/// # Example
///
/// ```
/// use twinguard_protocol::domain_separation::{build_domain_label, purposes};
///
/// let label = build_domain_label(purposes::BEACON_SIG, b"AP1");
/// assert!(label.starts_with(b"TWINGUARD-v1.BEACON-SIG."));
/// ```
pub fn build_domain_label(purpose: &str, context: &[u8]) -> Vec<u8> {
    let mut label = Vec::with_capacity(PREFIX.len() + purpose.len() + 1 + 4 + context.len());
    label.extend_from_slice(PREFIX);
    label.extend_from_slice(purpose.as_bytes());
    label.extend_from_slice(b".");
    label.extend_from_slice(&(context.len() as u32).to_be_bytes());
    label.extend_from_slice(context);
    label
}

/// Well-known domain separation purposes.
pub mod purposes {
    /// Packet signature over header and ciphertext.
    pub const PACKET_SIG: &str = "PACKET-SIG";
    /// Periodic access point beacon.
    pub const BEACON_SIG: &str = "BEACON-SIG";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_label_format() {
        let label = build_domain_label(purposes::PACKET_SIG, b"");
        assert_eq!(&label[..13], b"TWINGUARD-v1.");
        assert!(label.starts_with(b"TWINGUARD-v1.PACKET-SIG."));
    }

    #[test]
    fn test_domain_label_with_context() {
        let context = b"test-context";
        let label = build_domain_label(purposes::BEACON_SIG, context);
        assert_eq!(label.len(), 13 + 10 + 1 + 4 + 12);

        let len_offset = 13 + 10 + 1;
        let len_bytes: [u8; 4] = label[len_offset..len_offset + 4].try_into().unwrap();
        assert_eq!(u32::from_be_bytes(len_bytes), 12);
        assert!(label.ends_with(context));
    }

    #[test]
    fn test_different_purposes_differ() {
        assert_ne!(
            build_domain_label(purposes::PACKET_SIG, b"x"),
            build_domain_label(purposes::BEACON_SIG, b"x")
        );
    }

    #[test]
    fn test_length_prefix_prevents_ambiguity() {
        // "ab" + "c" and "a" + "bc" must not collide once lengths are encoded
        let mut a = build_domain_label(purposes::PACKET_SIG, b"ab");
        a.extend_from_slice(b"c");
        let mut b = build_domain_label(purposes::PACKET_SIG, b"a");
        b.extend_from_slice(b"bc");
        assert_ne!(a, b);
    }
}
