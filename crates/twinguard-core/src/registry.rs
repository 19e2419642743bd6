//! The access point registry.
//!
//! Every AP, fixed or guest, lives in one map keyed by id. Its role is a
//! tagged variant, so removing a guest is a single map removal rather than a
//! sweep over parallel collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use twinguard_identity::{ApId, EntityKeyPair, PublicKeys};
use twinguard_protocol::{ApDirectory, Beacon, Receiver, ReplayWindow};

/// Load units an AP can absorb.
pub const AP_CAPACITY: u32 = 100;

/// Signal strength advertised by a legitimate AP.
pub const LEGITIMATE_SIGNAL: u32 = 100;

/// Signal strength advertised by a malicious AP. Evil twins shout louder.
pub const EVIL_SIGNAL: u32 = 120;

/// Lower-left corner of the simulated area.
pub const AREA_MIN: Position = Position { x: 50.0, y: 50.0 };

/// Upper-right corner of the simulated area.
pub const AREA_MAX: Position = Position { x: 950.0, y: 550.0 };

/// The six fixed APs created at startup.
pub const FIXED_APS: [(&str, Position); 6] = [
    ("AP1", Position { x: 150.0, y: 150.0 }),
    ("AP2", Position { x: 500.0, y: 150.0 }),
    ("AP3", Position { x: 850.0, y: 150.0 }),
    ("AP4", Position { x: 150.0, y: 400.0 }),
    ("AP5", Position { x: 500.0, y: 400.0 }),
    ("AP6", Position { x: 850.0, y: 400.0 }),
];

/// A point in the simulated plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Point at `(x, y)`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This point moved `distance` along `angle` radians, kept inside the
    /// simulated area.
    pub fn offset(self, angle: f64, distance: f64) -> Self {
        Self {
            x: self.x + angle.cos() * distance,
            y: self.y + angle.sin() * distance,
        }
        .clamp_to_area()
    }

    /// Nearest point inside the simulated area.
    pub fn clamp_to_area(self) -> Self {
        Self {
            x: self.x.clamp(AREA_MIN.x, AREA_MAX.x),
            y: self.y.clamp(AREA_MIN.y, AREA_MAX.y),
        }
    }
}

/// What an AP is and whether it behaves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApRole {
    /// Fixed, well-behaved AP.
    Legitimate,
    /// Fixed AP that has been turned malicious.
    Evil,
    /// Transient AP spawned near `mimicking`.
    Guest {
        /// The fixed AP this guest impersonates.
        mimicking: ApId,
        /// When it appeared, Unix milliseconds.
        spawned_at_ms: u64,
        /// Ground truth.
        malicious: bool,
    },
}

impl ApRole {
    /// Whether the AP currently behaves.
    pub fn is_legitimate(&self) -> bool {
        match self {
            ApRole::Legitimate => true,
            ApRole::Evil => false,
            ApRole::Guest { malicious, .. } => !malicious,
        }
    }

    /// Whether the AP is transient.
    pub fn is_guest(&self) -> bool {
        matches!(self, ApRole::Guest { .. })
    }

    /// Set the legitimacy flag, keeping the fixed/guest distinction.
    pub fn set_legitimate(&mut self, legitimate: bool) {
        match self {
            ApRole::Legitimate | ApRole::Evil => {
                *self = if legitimate {
                    ApRole::Legitimate
                } else {
                    ApRole::Evil
                };
            }
            ApRole::Guest { malicious, .. } => *malicious = !legitimate,
        }
    }

    /// Impersonated AP, for guests.
    pub fn mimicking(&self) -> Option<&ApId> {
        match self {
            ApRole::Guest { mimicking, .. } => Some(mimicking),
            _ => None,
        }
    }
}

/// One access point and all of its protocol state.
#[derive(Debug)]
pub struct AccessPoint {
    id: ApId,
    position: Position,
    keys: EntityKeyPair,
    role: ApRole,
    capacity: u32,
    load: u32,
    spawned_at_ms: u64,
    replay: ReplayWindow,
}

impl AccessPoint {
    /// A fixed, legitimate AP.
    pub fn fixed(id: ApId, position: Position, replay: ReplayWindow, now_ms: u64) -> Self {
        Self::with_role(id, position, ApRole::Legitimate, replay, now_ms)
    }

    /// A guest AP impersonating `mimicking`.
    pub fn guest(
        id: ApId,
        position: Position,
        mimicking: ApId,
        malicious: bool,
        replay: ReplayWindow,
        now_ms: u64,
    ) -> Self {
        let role = ApRole::Guest {
            mimicking,
            spawned_at_ms: now_ms,
            malicious,
        };
        Self::with_role(id, position, role, replay, now_ms)
    }

    fn with_role(
        id: ApId,
        position: Position,
        role: ApRole,
        replay: ReplayWindow,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            position,
            keys: EntityKeyPair::generate(),
            role,
            capacity: AP_CAPACITY,
            load: 0,
            spawned_at_ms: now_ms,
            replay,
        }
    }

    /// Identifier.
    pub fn id(&self) -> &ApId {
        &self.id
    }

    /// Location.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Key material.
    pub fn keys(&self) -> &EntityKeyPair {
        &self.keys
    }

    /// Public keys for discovery.
    pub fn public_keys(&self) -> &PublicKeys {
        self.keys.public_keys()
    }

    /// Role and ground truth.
    pub fn role(&self) -> &ApRole {
        &self.role
    }

    /// Mutable role.
    pub fn role_mut(&mut self) -> &mut ApRole {
        &mut self.role
    }

    /// Shorthand for `role().is_legitimate()`.
    pub fn is_legitimate(&self) -> bool {
        self.role.is_legitimate()
    }

    /// Shorthand for `role().is_guest()`.
    pub fn is_guest(&self) -> bool {
        self.role.is_guest()
    }

    /// Fixed and currently legitimate: listed in the trusted repository.
    pub fn is_trusted(&self) -> bool {
        self.role == ApRole::Legitimate
    }

    /// Advertised signal strength.
    pub fn signal_strength(&self) -> u32 {
        if self.is_legitimate() {
            LEGITIMATE_SIGNAL
        } else {
            EVIL_SIGNAL
        }
    }

    /// Current load units.
    pub fn load(&self) -> u32 {
        self.load
    }

    /// Maximum load units.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Load as a percentage of capacity.
    pub fn load_percent(&self) -> f64 {
        f64::from(self.load) / f64::from(self.capacity.max(1)) * 100.0
    }

    /// Add load, saturating at capacity.
    pub fn add_load(&mut self, units: u32) {
        self.load = self.load.saturating_add(units).min(self.capacity);
    }

    /// Remove load, flooring at zero.
    pub fn decay_load(&mut self, units: u32) {
        self.load = self.load.saturating_sub(units);
    }

    /// When the AP was created, Unix milliseconds.
    pub fn spawned_at_ms(&self) -> u64 {
        self.spawned_at_ms
    }

    /// The AP's replay window.
    pub fn replay(&self) -> &ReplayWindow {
        &self.replay
    }

    /// Signed beacon announcing the current load.
    pub fn beacon(&self, now_ms: u64) -> twinguard_protocol::Result<Beacon> {
        Beacon::sign(&self.keys, self.id.clone(), now_ms, self.load)
    }
}

/// All access points, keyed by id.
#[derive(Debug, Default)]
pub struct ApRegistry {
    aps: BTreeMap<ApId, AccessPoint>,
}

impl ApRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the six fixed APs.
    pub fn with_fixed_aps(replay_ttl_ms: u64, replay_capacity: usize, now_ms: u64) -> Self {
        let mut registry = Self::new();
        for (name, position) in FIXED_APS {
            // Fixed names are valid literals.
            if let Ok(id) = ApId::new(name) {
                let replay = ReplayWindow::with_limits(replay_ttl_ms, replay_capacity);
                registry.insert(AccessPoint::fixed(id, position, replay, now_ms));
            }
        }
        registry
    }

    /// Add or replace an AP. Returns the one previously under the same id.
    pub fn insert(&mut self, ap: AccessPoint) -> Option<AccessPoint> {
        self.aps.insert(ap.id.clone(), ap)
    }

    /// Remove an AP.
    pub fn remove(&mut self, id: &ApId) -> Option<AccessPoint> {
        self.aps.remove(id)
    }

    /// Look up an AP.
    pub fn get(&self, id: &ApId) -> Option<&AccessPoint> {
        self.aps.get(id)
    }

    /// Look up an AP mutably.
    pub fn get_mut(&mut self, id: &ApId) -> Option<&mut AccessPoint> {
        self.aps.get_mut(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ApId) -> bool {
        self.aps.contains_key(id)
    }

    /// Number of APs.
    pub fn len(&self) -> usize {
        self.aps.len()
    }

    /// Whether there are no APs.
    pub fn is_empty(&self) -> bool {
        self.aps.is_empty()
    }

    /// APs in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessPoint> {
        self.aps.values()
    }

    /// APs in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AccessPoint> {
        self.aps.values_mut()
    }

    /// Every id, in order.
    pub fn ids(&self) -> Vec<ApId> {
        self.aps.keys().cloned().collect()
    }

    /// Ids listed in the trusted repository.
    pub fn trusted_ids(&self) -> Vec<ApId> {
        self.iter()
            .filter(|ap| ap.is_trusted())
            .map(|ap| ap.id.clone())
            .collect()
    }

    /// APs currently malicious, fixed or guest.
    pub fn evil_count(&self) -> usize {
        self.iter().filter(|ap| !ap.is_legitimate()).count()
    }

    /// Guest APs currently alive.
    pub fn guest_count(&self) -> usize {
        self.iter().filter(|ap| ap.is_guest()).count()
    }
}

impl ApDirectory for ApRegistry {
    fn receiver(&mut self, id: &ApId) -> Option<Receiver<'_>> {
        let ap = self.aps.get_mut(id)?;
        let in_trusted_repo = ap.role == ApRole::Legitimate;
        let marked_legitimate = ap.role.is_legitimate();
        Some(Receiver {
            keys: &ap.keys,
            replay: &mut ap.replay,
            in_trusted_repo,
            marked_legitimate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ap(name: &str) -> ApId {
        ApId::new(name).unwrap()
    }

    fn registry() -> ApRegistry {
        ApRegistry::with_fixed_aps(120_000, 64, 0)
    }

    #[test]
    fn test_fixed_seed() {
        let registry = registry();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.trusted_ids().len(), 6);
        assert_eq!(registry.get(&ap("AP5")).unwrap().position(), Position::new(500.0, 400.0));
        assert!(registry.iter().all(|a| a.capacity() == AP_CAPACITY && a.load() == 0));
        assert_eq!(registry.evil_count(), 0);
    }

    #[test]
    fn test_toggle_fixed_ap() {
        let mut registry = registry();
        let id = ap("AP2");
        let entry = registry.get_mut(&id).unwrap();
        entry.role_mut().set_legitimate(false);
        assert_eq!(entry.role(), &ApRole::Evil);
        assert_eq!(entry.signal_strength(), EVIL_SIGNAL);

        assert_eq!(registry.trusted_ids().len(), 5);
        assert_eq!(registry.evil_count(), 1);

        let receiver = registry.receiver(&id).unwrap();
        assert!(!receiver.in_trusted_repo);
        assert!(!receiver.marked_legitimate);
    }

    #[test]
    fn test_guest_is_marked_but_not_trusted() {
        let mut registry = registry();
        let id = ap("AP1_guest_0001_0");
        registry.insert(AccessPoint::guest(
            id.clone(),
            Position::new(200.0, 200.0),
            ap("AP1"),
            false,
            ReplayWindow::new(),
            5,
        ));

        let receiver = registry.receiver(&id).unwrap();
        assert!(!receiver.in_trusted_repo);
        assert!(receiver.marked_legitimate);

        let guest = registry.get_mut(&id).unwrap();
        assert_eq!(guest.role().mimicking(), Some(&ap("AP1")));
        guest.role_mut().set_legitimate(false);
        assert!(guest.is_guest());
        assert!(!guest.is_legitimate());
        assert_eq!(registry.guest_count(), 1);
    }

    #[test]
    fn test_load_bounds() {
        let mut registry = registry();
        let entry = registry.get_mut(&ap("AP1")).unwrap();
        entry.add_load(150);
        assert_eq!(entry.load(), AP_CAPACITY);
        assert_eq!(entry.load_percent(), 100.0);
        entry.decay_load(2);
        assert_eq!(entry.load(), 98);
        entry.decay_load(500);
        assert_eq!(entry.load(), 0);
    }

    #[test]
    fn test_offset_clamped_to_area() {
        let far = Position::new(900.0, 100.0).offset(0.0, 500.0);
        assert_eq!(far, Position::new(AREA_MAX.x, 100.0));

        let up = Position::new(100.0, 60.0).offset(-std::f64::consts::FRAC_PI_2, 180.0);
        assert_eq!(up.y, AREA_MIN.y);
    }

    #[test]
    fn test_beacon_signed_by_ap() {
        let registry = registry();
        let entry = registry.get(&ap("AP3")).unwrap();
        let beacon = entry.beacon(1_000).unwrap();
        assert!(beacon.verify(&entry.public_keys().signing).is_ok());
    }

    #[test]
    fn test_unknown_receiver() {
        let mut registry = registry();
        assert!(registry.receiver(&ap("AP9")).is_none());
    }
}
