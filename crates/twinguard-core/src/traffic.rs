//! One generator tick: pick a destination, run the protocol, price the
//! packet and feed the detector.
//!
//! Two verdicts come out of every packet. The protocol outcome (did the
//! destination verify and decrypt it) is what the detector observes. The
//! final verdict also applies the cost model, which counts a packet sent to
//! an actually malicious AP as lost even when the crypto succeeded. Counters
//! use the final verdict.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info, trace, warn};

use twinguard_detector::DEFAULT_EVIL_THRESHOLD;
use twinguard_game::Strategy;
use twinguard_identity::{ApId, DeviceId};
use twinguard_protocol::{verify_packet, Packet, Rejection};

use crate::events::PacketEvent;
use crate::world::WorldState;

/// Posterior above which AVOID excludes an AP.
pub const AVOID_EVIL_THRESHOLD: f64 = 0.3;

/// Confidence above which AVOID excludes an AP.
pub const AVOID_MIN_CONFIDENCE: f64 = 0.4;

/// A correct detection is tallied once confidence passes this.
pub const DETECTION_MIN_CONFIDENCE: f64 = 0.5;

/// Result of running the protocol for one packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProtocolOutcome {
    Accepted,
    Rejected(Rejection),
    /// Malicious destination took the packet; no crypto ran.
    Captured,
    /// The packet could not be built.
    Unsent,
}

impl ProtocolOutcome {
    fn ok(self) -> bool {
        self == ProtocolOutcome::Accepted
    }

    fn rejection(self) -> Option<Rejection> {
        match self {
            ProtocolOutcome::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

/// Pick a destination under `strategy`.
///
/// TRUST and VERIFY choose uniformly over every AP. AVOID first drops APs
/// the detector is confident are evil, remembering them in the avoided set,
/// and falls back to the trusted repository if nothing is left.
pub fn choose_destination(world: &mut WorldState, strategy: Strategy) -> Option<ApId> {
    let ids = world.registry.ids();
    let pool = if strategy == Strategy::Avoid {
        let mut remaining = Vec::with_capacity(ids.len());
        for id in ids {
            let suspected = world.detectors.get(&id).is_some_and(|d| {
                d.is_likely_evil(AVOID_EVIL_THRESHOLD) && d.confidence() > AVOID_MIN_CONFIDENCE
            });
            if suspected {
                if world.avoided.insert(id.clone()) {
                    info!(ap = %id, "access point avoided");
                }
            } else {
                remaining.push(id);
            }
        }
        if remaining.is_empty() {
            world.registry.trusted_ids()
        } else {
            remaining
        }
    } else {
        ids
    };
    pool.choose(&mut world.rng).cloned()
}

/// Send one packet from `device_id`.
///
/// Returns `None` when the device is unknown or there is nowhere to send.
pub fn send_packet(world: &mut WorldState, device_id: &DeviceId, now_ms: u64) -> Option<PacketEvent> {
    if !world.devices.contains_key(device_id) {
        return None;
    }

    // One profile for the whole packet.
    let profile = Arc::clone(&world.profile);
    let strategy = world.schedule.active();

    let destination = choose_destination(world, strategy)?;
    let pre_avoided = world.avoided.contains(&destination);

    let (to_pos, actually_malicious, exchange) = {
        let ap = world.registry.get(&destination)?;
        (ap.position(), !ap.is_legitimate(), ap.public_keys().exchange.clone())
    };
    let device = world.devices.get(device_id)?;
    let from_pos = device.position();

    let protocol = if actually_malicious {
        ProtocolOutcome::Captured
    } else {
        let sealed = Packet::seal(
            device.keys(),
            device_id.clone(),
            destination.clone(),
            &exchange,
            world.config.traffic.payload.as_bytes(),
            now_ms,
            &mut world.rng,
        );
        match sealed {
            Ok(packet) => {
                match verify_packet(&mut world.registry, &packet, world.tolerance, now_ms) {
                    Ok(_) => ProtocolOutcome::Accepted,
                    Err(reason) => {
                        debug!(device = %device_id, ap = %destination, %reason, "packet rejected");
                        ProtocolOutcome::Rejected(reason)
                    }
                }
            }
            Err(e) => {
                warn!(device = %device_id, ap = %destination, error = %e, "failed to build packet");
                ProtocolOutcome::Unsent
            }
        }
    };

    let pricing = profile.price(strategy, actually_malicious, pre_avoided);
    let delivered = protocol.ok() && !pricing.dropped;

    world
        .counters
        .record_packet(delivered, pricing.cost, pricing.avoided);
    world.cost_since_last_tick += pricing.cost;
    world.schedule.record(strategy, delivered, pricing.cost);
    if let Some(device) = world.devices.get_mut(device_id) {
        device.record(delivered);
    }
    if let Some(ap) = world.registry.get_mut(&destination) {
        ap.add_load(1);
    }

    let mut posterior = 0.0;
    let mut detected_as_evil = false;
    if let Some(detector) = world.detectors.get_mut(&destination) {
        posterior = detector.observe(protocol.ok(), now_ms);
        detected_as_evil = detector.is_likely_evil(DEFAULT_EVIL_THRESHOLD);

        if detected_as_evil
            && detector.confidence() > DETECTION_MIN_CONFIDENCE
            && actually_malicious
            && detector.mark_counted()
        {
            world.counters.evil_aps_detected_correctly += 1;
            info!(ap = %destination, posterior, "evil access point identified");
        }
    }

    trace!(
        device = %device_id,
        ap = %destination,
        strategy = %strategy,
        cost = pricing.cost,
        delivered,
        "packet sent"
    );

    Some(PacketEvent {
        from: device_id.clone(),
        to_ap: destination,
        from_pos,
        to_pos,
        ok: delivered,
        protocol_ok: protocol.ok(),
        rejection: protocol.rejection(),
        detected_as_evil,
        was_avoided: pricing.avoided,
        strategy,
        sensitivity: profile.mode,
        outcome: pricing.outcome,
        cost: pricing.cost,
        posterior,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfigBuilder;
    use crate::registry::{AccessPoint, Position};
    use twinguard_game::{Outcome, PayoffMatrix};

    fn world(strategy: Strategy) -> WorldState {
        let config = SimConfigBuilder::new()
            .with_initial_strategy(strategy)
            .with_rng_seed(9)
            .build();
        WorldState::new(config, 1_000).unwrap()
    }

    fn device(world: &mut WorldState) -> DeviceId {
        let id = DeviceId::new("dev").unwrap();
        world.connect_device(id.clone());
        id
    }

    fn ap(name: &str) -> ApId {
        ApId::new(name).unwrap()
    }

    /// Drop every AP except `keep`.
    fn only(world: &mut WorldState, keep: &str) {
        for id in world.registry.ids() {
            if id.as_str() != keep {
                world.registry.remove(&id);
                world.detectors.remove(&id);
            }
        }
    }

    #[test]
    fn test_legit_destination_under_trust() {
        let mut world = world(Strategy::Trust);
        let dev = device(&mut world);
        only(&mut world, "AP1");

        let event = send_packet(&mut world, &dev, 1_000).unwrap();
        assert_eq!(event.to_ap, ap("AP1"));
        assert!(event.protocol_ok);
        assert!(event.ok);
        assert_eq!(event.cost, PayoffMatrix::NON.trust_cooperate.cost);
        assert_eq!(event.outcome, Outcome::Cooperate);

        assert_eq!(world.counters().total_delivered, 1);
        assert_eq!(world.schedule().per_strategy().trust.sent, 1);
        assert_eq!(world.registry().get(&ap("AP1")).unwrap().load(), 1);
        assert_eq!(world.device(&dev).unwrap().record_view().delivered, 1);
        assert!(event.posterior < 0.25);
    }

    #[test]
    fn test_evil_destination_is_captured() {
        let mut world = world(Strategy::Verify);
        let dev = device(&mut world);
        only(&mut world, "AP2");
        world.toggle_legitimacy(&ap("AP2"));

        let event = send_packet(&mut world, &dev, 1_000).unwrap();
        assert!(!event.protocol_ok);
        assert_eq!(event.rejection, None);
        assert!(!event.ok);
        assert_eq!(event.cost, PayoffMatrix::NON.verify_defect.cost);
        assert_eq!(world.counters().dropped, 1);
        assert!(event.posterior > 0.25);
    }

    #[test]
    fn test_detection_tallied_once() {
        let mut world = world(Strategy::Trust);
        let dev = device(&mut world);
        only(&mut world, "AP3");
        world.toggle_legitimacy(&ap("AP3"));

        for i in 0..30 {
            send_packet(&mut world, &dev, 1_000 + i).unwrap();
        }
        assert_eq!(world.counters().evil_aps_detected_correctly, 1);
        assert!(world.detector(&ap("AP3")).unwrap().is_counted());
    }

    #[test]
    fn test_avoid_excludes_confident_evil() {
        let mut world = world(Strategy::Avoid);
        let dev = device(&mut world);
        only(&mut world, "AP1");

        let guest = ap("AP1_guest_0001_0");
        let replay = world.new_replay_window();
        world.add_ap(
            AccessPoint::guest(guest.clone(), Position::new(200.0, 200.0), ap("AP1"), true, replay, 1_000),
            1_000,
        );
        let detector = world.detectors.get_mut(&guest).unwrap();
        for _ in 0..10 {
            detector.observe(false, 1_000);
        }

        for i in 0..20 {
            let event = send_packet(&mut world, &dev, 1_000 + i).unwrap();
            assert_eq!(event.to_ap, ap("AP1"));
        }
        assert!(world.avoided().contains(&guest));
    }

    #[test]
    fn test_avoid_falls_back_to_trusted_pool() {
        let mut world = world(Strategy::Avoid);
        let dev = device(&mut world);
        only(&mut world, "AP1");
        let detector = world.detectors.get_mut(&ap("AP1")).unwrap();
        for _ in 0..10 {
            detector.observe(false, 1_000);
        }

        let event = send_packet(&mut world, &dev, 1_000).unwrap();
        assert_eq!(event.to_ap, ap("AP1"));
        assert!(event.was_avoided);
        assert_eq!(event.cost, PayoffMatrix::NON.avoid_defect.cost);
        assert!(event.protocol_ok);
        assert!(!event.ok);
        assert_eq!(world.counters().packets_avoided, 1);
    }

    #[test]
    fn test_unknown_device_or_empty_registry() {
        let mut world = world(Strategy::Trust);
        assert!(send_packet(&mut world, &DeviceId::new("ghost").unwrap(), 0).is_none());

        let dev = device(&mut world);
        for id in world.registry.ids() {
            world.registry.remove(&id);
        }
        assert!(send_packet(&mut world, &dev, 0).is_none());
        assert_eq!(world.counters().total_sent, 0);
    }

    #[test]
    fn test_tick_cost_accumulates() {
        let mut world = world(Strategy::Trust);
        let dev = device(&mut world);
        only(&mut world, "AP1");
        for i in 0..4 {
            send_packet(&mut world, &dev, 1_000 + i);
        }
        assert_eq!(world.take_cost_since_last_tick(), 4.0);
        assert_eq!(world.counters().cumulative_cost, 4.0);
    }
}
