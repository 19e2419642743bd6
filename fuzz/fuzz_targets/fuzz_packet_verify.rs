//! Fuzz target for packet decoding and verification.
//!
//! Arbitrary bytes are decoded as a packet and, when that succeeds, run
//! through the full receiver-side check sequence. Every input must end in a
//! plaintext or a rejection, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twinguard_identity::{ApId, EntityKeyPair};
use twinguard_protocol::{verify_packet, ApDirectory, Packet, Receiver, ReplayWindow, Tolerance};

struct SingleAp {
    id: ApId,
    keys: EntityKeyPair,
    replay: ReplayWindow,
}

impl ApDirectory for SingleAp {
    fn receiver(&mut self, id: &ApId) -> Option<Receiver<'_>> {
        (id == &self.id).then(|| Receiver {
            keys: &self.keys,
            replay: &mut self.replay,
            in_trusted_repo: true,
            marked_legitimate: true,
        })
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::from_bytes(data) {
        let Ok(id) = ApId::new("AP1") else {
            return;
        };
        let mut directory = SingleAp {
            id,
            keys: EntityKeyPair::generate(),
            replay: ReplayWindow::new(),
        };
        let now_ms = packet.header.timestamp_ms;
        let _ = verify_packet(&mut directory, &packet, Tolerance::clamped(60), now_ms);
    }
});
