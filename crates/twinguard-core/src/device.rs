//! Simulated client devices.

use serde::{Deserialize, Serialize};

use twinguard_identity::{ApId, DeviceId, EntityKeyPair, PublicKeys};

use crate::registry::Position;

/// Row on which devices are placed.
const DEVICE_ROW_Y: f64 = 500.0;

/// A connected device.
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    keys: EntityKeyPair,
    position: Position,
    connected_to: Option<ApId>,
    sent: u64,
    delivered: u64,
}

impl Device {
    /// The `index`-th device to connect, associated with `home`.
    pub fn new(id: DeviceId, index: usize, home: Option<ApId>) -> Self {
        Self {
            id,
            keys: EntityKeyPair::generate(),
            position: Position::new(80.0 + 40.0 * index as f64, DEVICE_ROW_Y),
            connected_to: home,
            sent: 0,
            delivered: 0,
        }
    }

    /// Identifier.
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Key material.
    pub fn keys(&self) -> &EntityKeyPair {
        &self.keys
    }

    /// Location.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Associated AP. It may no longer exist.
    pub fn connected_to(&self) -> Option<&ApId> {
        self.connected_to.as_ref()
    }

    /// Count one packet.
    pub fn record(&mut self, delivered: bool) {
        self.sent += 1;
        if delivered {
            self.delivered += 1;
        }
    }

    /// Serializable view.
    pub fn record_view(&self) -> DeviceRecord {
        DeviceRecord {
            id: self.id.clone(),
            position: self.position,
            connected_to: self.connected_to.clone(),
            public_keys: KeyView::from(self.keys.public_keys()),
            sent: self.sent,
            delivered: self.delivered,
        }
    }
}

/// Hex-encoded public keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyView {
    /// Ed25519 verifying key.
    pub signing: String,
    /// X25519 key-exchange key.
    pub exchange: String,
}

impl From<&PublicKeys> for KeyView {
    fn from(keys: &PublicKeys) -> Self {
        Self {
            signing: keys.signing.to_hex(),
            exchange: keys.exchange.to_hex(),
        }
    }
}

/// What `connectDevice` returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Identifier.
    pub id: DeviceId,
    /// Location.
    pub position: Position,
    /// Associated AP.
    pub connected_to: Option<ApId>,
    /// Public keys.
    pub public_keys: KeyView,
    /// Packets sent.
    pub sent: u64,
    /// Packets delivered.
    pub delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_by_index() {
        let home = ApId::new("AP1").ok();
        let d0 = Device::new(DeviceId::new("a").unwrap(), 0, home.clone());
        let d2 = Device::new(DeviceId::new("c").unwrap(), 2, home);
        assert_eq!(d0.position(), Position::new(80.0, 500.0));
        assert_eq!(d2.position(), Position::new(160.0, 500.0));
        assert_eq!(d2.connected_to().map(ApId::as_str), Some("AP1"));
    }

    #[test]
    fn test_counters() {
        let mut device = Device::new(DeviceId::new("phone").unwrap(), 0, None);
        device.record(true);
        device.record(false);
        let view = device.record_view();
        assert_eq!((view.sent, view.delivered), (2, 1));
        assert_eq!(view.public_keys.signing.len(), 64);
    }
}
