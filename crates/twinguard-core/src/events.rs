//! Outbound events pushed to every subscriber.

use serde::{Deserialize, Serialize};

use twinguard_game::{Outcome, Sensitivity, SensitivityProfile, Strategy};
use twinguard_identity::{ApId, DeviceId};
use twinguard_protocol::{Beacon, Rejection};

use crate::device::DeviceRecord;
use crate::registry::Position;
use crate::stats::StatsSnapshot;

/// Something observers should know about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    /// Signed beacon from every AP.
    Beacons(Vec<BeaconEvent>),
    /// Periodic stats snapshot.
    Stats(Box<StatsSnapshot>),
    /// One packet was sent.
    PacketCreated(PacketEvent),
    /// A guest AP appeared.
    #[serde(rename = "guestAPSpawned")]
    GuestSpawned(GuestSpawn),
    /// A guest AP was removed.
    #[serde(rename = "guestAPDespawned")]
    GuestDespawned(GuestDespawn),
    /// An AP's legitimacy was flipped by hand.
    #[serde(rename = "apStateChanged", rename_all = "camelCase")]
    LegitimacyToggled {
        /// The AP.
        id: ApId,
        /// New legitimacy.
        is_legitimate: bool,
    },
    /// The sensitivity profile was swapped.
    SensitivityUpdated(SensitivityProfile),
    /// The guest evil probability changed.
    #[serde(rename_all = "camelCase")]
    EvilProbabilityUpdated {
        /// New probability in `[0, 1]`.
        evil_probability: f64,
    },
    /// The global strategy rotated.
    #[serde(rename_all = "camelCase")]
    StrategyMode {
        /// Strategy now in force.
        mode: Strategy,
        /// When its window closes, Unix milliseconds.
        ends_at_ms: u64,
    },
    /// Device list after a connect.
    Devices(Vec<DeviceRecord>),
}

impl Event {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Beacons(_) => "beacons",
            Event::Stats(_) => "stats",
            Event::PacketCreated(_) => "packetCreated",
            Event::GuestSpawned(_) => "guestAPSpawned",
            Event::GuestDespawned(_) => "guestAPDespawned",
            Event::LegitimacyToggled { .. } => "apStateChanged",
            Event::SensitivityUpdated(_) => "sensitivityUpdated",
            Event::EvilProbabilityUpdated { .. } => "evilProbabilityUpdated",
            Event::StrategyMode { .. } => "strategyMode",
            Event::Devices(_) => "devices",
        }
    }
}

/// Beacon with a hex signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconEvent {
    /// Announcing AP.
    pub ap: ApId,
    /// Unix milliseconds.
    pub timestamp_ms: u64,
    /// Load units.
    pub load: u32,
    /// Ed25519 signature, hex.
    pub signature: String,
}

impl From<&Beacon> for BeaconEvent {
    fn from(beacon: &Beacon) -> Self {
        Self {
            ap: beacon.ap.clone(),
            timestamp_ms: beacon.timestamp_ms,
            load: beacon.load,
            signature: beacon.signature.to_hex(),
        }
    }
}

/// Everything known about one sent packet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketEvent {
    /// Sending device.
    pub from: DeviceId,
    /// Destination AP.
    pub to_ap: ApId,
    /// Device position.
    pub from_pos: Position,
    /// AP position.
    pub to_pos: Position,
    /// Final verdict: the protocol accepted it and the cost model did not
    /// count it as lost.
    pub ok: bool,
    /// Protocol outcome fed to the detector.
    pub protocol_ok: bool,
    /// Verification failure, when the protocol ran and rejected.
    pub rejection: Option<Rejection>,
    /// Destination's detector posterior is above the default threshold.
    pub detected_as_evil: bool,
    /// Destination was already in the avoided set under AVOID.
    pub was_avoided: bool,
    /// Strategy in force.
    pub strategy: Strategy,
    /// Sensitivity mode the cost came from.
    pub sensitivity: Sensitivity,
    /// Payoff column charged.
    pub outcome: Outcome,
    /// Cost charged.
    pub cost: f64,
    /// Destination posterior after this packet.
    pub posterior: f64,
}

/// A new guest AP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSpawn {
    /// Guest id.
    pub id: ApId,
    /// Location.
    pub position: Position,
    /// Impersonated AP.
    pub mimicking: ApId,
    /// Ground truth.
    pub is_evil: bool,
    /// Unix milliseconds.
    pub spawned_at_ms: u64,
}

/// A removed guest AP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestDespawn {
    /// Guest id.
    pub id: ApId,
    /// Ground truth at removal.
    pub was_evil: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_tags() {
        let events = [
            Event::EvilProbabilityUpdated {
                evil_probability: 0.5,
            },
            Event::LegitimacyToggled {
                id: ApId::new("AP1").unwrap(),
                is_legitimate: false,
            },
            Event::GuestDespawned(GuestDespawn {
                id: ApId::new("AP1_guest_0001_0").unwrap(),
                was_evil: true,
            }),
            Event::StrategyMode {
                mode: Strategy::Verify,
                ends_at_ms: 30_000,
            },
            Event::SensitivityUpdated(SensitivityProfile::default()),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn test_toggle_payload() {
        let json = serde_json::to_value(Event::LegitimacyToggled {
            id: ApId::new("AP4").unwrap(),
            is_legitimate: true,
        })
        .unwrap();
        assert_eq!(json["data"]["id"], "AP4");
        assert_eq!(json["data"]["isLegitimate"], true);
    }
}
