//! The authoritative simulation state.
//!
//! [`WorldState`] owns every registry: APs, devices, detectors, the avoided
//! set, the active sensitivity profile and all counters. It is plain data
//! with synchronous methods that take `now_ms`; the async driver in
//! [`crate::simulation`] wraps it in a single lock, so each method call is
//! one atomic step.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use twinguard_detector::ApDetector;
use twinguard_game::{NashRouter, Sensitivity, SensitivityProfile, Strategy, StrategySchedule};
use twinguard_identity::{ApId, DeviceId};
use twinguard_protocol::{Beacon, ReplayWindow, Tolerance};

use crate::commands::{ApInfo, TrustedEntry};
use crate::config::SimConfig;
use crate::device::{Device, DeviceRecord, KeyView};
use crate::registry::{AccessPoint, ApRegistry};
use crate::stats::{detection_accuracy, Counters, DetectorSnapshot, StatsSnapshot};
use crate::Result;

/// Fixed AP new devices associate with.
const HOME_AP: &str = "AP1";

/// All mutable simulation state.
#[derive(Debug)]
pub struct WorldState {
    pub(crate) config: SimConfig,
    pub(crate) registry: ApRegistry,
    pub(crate) devices: BTreeMap<DeviceId, Device>,
    pub(crate) detectors: HashMap<ApId, ApDetector>,
    pub(crate) avoided: BTreeSet<ApId>,
    pub(crate) profile: Arc<SensitivityProfile>,
    pub(crate) schedule: StrategySchedule,
    pub(crate) router: NashRouter,
    pub(crate) counters: Counters,
    pub(crate) cost_since_last_tick: f64,
    pub(crate) tolerance: Tolerance,
    pub(crate) evil_probability: f64,
    pub(crate) guest_batches: u64,
    pub(crate) rng: StdRng,
}

impl WorldState {
    /// Validate `config` and build the six-AP starting world.
    pub fn new(config: SimConfig, now_ms: u64) -> Result<Self> {
        config.validate()?;

        let registry = ApRegistry::with_fixed_aps(
            config.protocol.replay_ttl_ms,
            config.protocol.replay_capacity,
            now_ms,
        );
        let detectors = registry
            .ids()
            .into_iter()
            .map(|id| (id, ApDetector::new(config.detector, now_ms)))
            .collect();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            registry,
            devices: BTreeMap::new(),
            detectors,
            avoided: BTreeSet::new(),
            profile: Arc::new(SensitivityProfile::for_mode(config.initial_sensitivity)),
            schedule: StrategySchedule::new(
                config.scheduler.initial_strategy,
                config.scheduler.window_ms,
                now_ms,
            ),
            router: NashRouter::new(),
            counters: Counters::default(),
            cost_since_last_tick: 0.0,
            tolerance: Tolerance::clamped(config.protocol.timestamp_tolerance_secs),
            evil_probability: config.adversary.evil_probability,
            guest_batches: 0,
            rng,
            config,
        })
    }

    // ===== Queries =====

    /// Configuration the world was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The AP registry.
    pub fn registry(&self) -> &ApRegistry {
        &self.registry
    }

    /// Detector for `id`.
    pub fn detector(&self, id: &ApId) -> Option<&ApDetector> {
        self.detectors.get(id)
    }

    /// Number of detectors.
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// APs excluded under AVOID at some point and not since rehabilitated.
    pub fn avoided(&self) -> &BTreeSet<ApId> {
        &self.avoided
    }

    /// Shared handle to the active sensitivity profile.
    pub fn profile(&self) -> Arc<SensitivityProfile> {
        Arc::clone(&self.profile)
    }

    /// Global strategy in force.
    pub fn active_strategy(&self) -> Strategy {
        self.schedule.active()
    }

    /// Strategy schedule and per-strategy counters.
    pub fn schedule(&self) -> &StrategySchedule {
        &self.schedule
    }

    /// Advisory router.
    pub fn router(&self) -> &NashRouter {
        &self.router
    }

    /// Aggregate counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Current timestamp tolerance.
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Probability a new guest is malicious.
    pub fn evil_probability(&self) -> f64 {
        self.evil_probability
    }

    /// Look up a device.
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Every device record, in id order.
    pub fn device_records(&self) -> Vec<DeviceRecord> {
        self.devices.values().map(Device::record_view).collect()
    }

    /// Discovery listing.
    pub fn ap_infos(&self) -> Vec<ApInfo> {
        self.registry
            .iter()
            .map(|ap| {
                let belief = self.detectors.get(ap.id()).map_or(0.0, ApDetector::posterior);
                ApInfo::new(ap, belief)
            })
            .collect()
    }

    /// Public keys of every fixed AP that is currently legitimate.
    pub fn trusted_repo(&self) -> BTreeMap<ApId, TrustedEntry> {
        self.registry
            .iter()
            .filter(|ap| ap.is_trusted())
            .map(|ap| {
                let entry = TrustedEntry {
                    id: ap.id().clone(),
                    public_keys: KeyView::from(ap.public_keys()),
                    is_legitimate: true,
                };
                (ap.id().clone(), entry)
            })
            .collect()
    }

    /// Signed beacon from every AP.
    pub fn beacons(&self, now_ms: u64) -> Result<Vec<Beacon>> {
        self.registry
            .iter()
            .map(|ap| ap.beacon(now_ms).map_err(Into::into))
            .collect()
    }

    /// Full stats snapshot. Refreshes the advisory router for every AP.
    pub fn snapshot(&mut self, now_ms: u64) -> StatsSnapshot {
        let beliefs: Vec<(ApId, f64)> = self
            .detectors
            .iter()
            .map(|(id, d)| (id.clone(), d.posterior()))
            .collect();
        self.router
            .compute(beliefs.iter().map(|(id, p)| (id, *p)), &self.profile.matrix);

        StatsSnapshot {
            timestamp_ms: now_ms,
            counters: self.counters,
            cost_since_last_tick: self.cost_since_last_tick,
            detection_accuracy: detection_accuracy(&self.registry, &self.detectors),
            detectors: self
                .detectors
                .iter()
                .map(|(id, d)| (id.clone(), DetectorSnapshot::from(d)))
                .collect(),
            ap_loads: self
                .registry
                .iter()
                .map(|ap| (ap.id().clone(), ap.load_percent()))
                .collect(),
            router: self.router.history().clone(),
            active_evil_aps: self.registry.evil_count(),
            active_guest_aps: self.registry.guest_count(),
            avoided_aps_count: self.avoided.len(),
            profile: *self.profile,
            active_strategy: self.schedule.active(),
            mode_ends_at_ms: self.schedule.window_ends_at_ms(),
            per_strategy: *self.schedule.per_strategy(),
            evil_probability: self.evil_probability,
            tolerance_secs: self.tolerance.secs(),
            device_count: self.devices.len(),
        }
    }

    // ===== Mutations =====

    /// Create the device on first call. Returns its record and whether it
    /// was new.
    pub fn connect_device(&mut self, id: DeviceId) -> (DeviceRecord, bool) {
        if let Some(device) = self.devices.get(&id) {
            return (device.record_view(), false);
        }
        let home = ApId::new(HOME_AP).ok();
        let device = Device::new(id.clone(), self.devices.len(), home);
        let record = device.record_view();
        info!(
            device = %id,
            keys = %device.keys().public_keys().fingerprint(),
            "device connected"
        );
        self.devices.insert(id, device);
        (record, true)
    }

    /// Set the timestamp tolerance, clamped to the allowed range.
    pub fn set_tolerance(&mut self, secs: u64) -> Tolerance {
        self.tolerance = Tolerance::clamped(secs);
        info!(secs = self.tolerance.secs(), "timestamp tolerance set");
        self.tolerance
    }

    /// Swap the whole sensitivity profile.
    pub fn set_sensitivity(&mut self, mode: Sensitivity) -> Arc<SensitivityProfile> {
        self.profile = Arc::new(SensitivityProfile::for_mode(mode));
        info!(mode = %mode, "data sensitivity set");
        Arc::clone(&self.profile)
    }

    /// Set the guest evil probability from a percentage. Non-finite input
    /// counts as zero. Returns the stored probability.
    pub fn set_evil_probability(&mut self, percent: f64) -> f64 {
        let percent = if percent.is_finite() { percent } else { 0.0 };
        self.evil_probability = percent.clamp(0.0, 100.0) / 100.0;
        info!(probability = self.evil_probability, "evil guest probability set");
        self.evil_probability
    }

    /// Flip an AP's legitimacy. Returns the new flag, or `None` for an
    /// unknown id.
    pub fn toggle_legitimacy(&mut self, id: &ApId) -> Option<bool> {
        let ap = self.registry.get_mut(id)?;
        let legitimate = !ap.is_legitimate();
        ap.role_mut().set_legitimate(legitimate);

        if legitimate {
            self.avoided.remove(id);
        } else {
            self.counters.spoofers_spawned += 1;
        }
        info!(ap = %id, legitimate, "legitimacy toggled");
        Some(legitimate)
    }

    /// Register a new AP with a fresh detector at the common prior.
    pub fn add_ap(&mut self, ap: AccessPoint, now_ms: u64) {
        let id = ap.id().clone();
        self.detectors
            .insert(id.clone(), ApDetector::new(self.config.detector, now_ms));
        self.registry.insert(ap);
        debug!(ap = %id, "access point registered");
    }

    /// Remove a guest AP from every registry at once.
    ///
    /// Returns `None` if `id` is unknown or not a guest, so repeated calls
    /// are harmless.
    pub fn despawn_guest(&mut self, id: &ApId) -> Option<AccessPoint> {
        if !self.registry.get(id)?.is_guest() {
            return None;
        }
        let ap = self.registry.remove(id)?;
        self.detectors.remove(id);
        self.avoided.remove(id);
        self.router.forget(id);
        Some(ap)
    }

    /// Fresh replay window with the configured limits.
    pub fn new_replay_window(&self) -> ReplayWindow {
        ReplayWindow::with_limits(
            self.config.protocol.replay_ttl_ms,
            self.config.protocol.replay_capacity,
        )
    }

    /// Advance to the next strategy.
    pub fn rotate_strategy(&mut self, now_ms: u64) -> Strategy {
        let strategy = self.schedule.rotate(now_ms);
        info!(
            strategy = %strategy,
            ends_at_ms = self.schedule.window_ends_at_ms(),
            "strategy rotated"
        );
        strategy
    }

    /// Drain load from every AP.
    pub fn decay_load(&mut self, units: u32) {
        for ap in self.registry.iter_mut() {
            ap.decay_load(units);
        }
    }

    /// Reset the per-tick cost accumulator, returning its value.
    pub fn take_cost_since_last_tick(&mut self) -> f64 {
        std::mem::take(&mut self.cost_since_last_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfigBuilder;
    use crate::registry::Position;
    use twinguard_game::PayoffMatrix;

    fn world() -> WorldState {
        WorldState::new(SimConfigBuilder::new().with_rng_seed(1).build(), 0).unwrap()
    }

    fn ap(name: &str) -> ApId {
        ApId::new(name).unwrap()
    }

    fn add_guest(world: &mut WorldState, name: &str, malicious: bool) -> ApId {
        let id = ap(name);
        let guest = AccessPoint::guest(
            id.clone(),
            Position::new(300.0, 300.0),
            ap("AP1"),
            malicious,
            world.new_replay_window(),
            0,
        );
        world.add_ap(guest, 0);
        id
    }

    #[test]
    fn test_initial_world() {
        let world = world();
        assert_eq!(world.registry().len(), 6);
        assert_eq!(world.detector_count(), 6);
        assert_eq!(world.trusted_repo().len(), 6);
        assert_eq!(world.active_strategy(), Strategy::Trust);
        assert_eq!(world.tolerance().secs(), 60);
        assert_eq!(world.profile().matrix, PayoffMatrix::NON);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfigBuilder::new().with_packets_per_sec(0).build();
        assert!(WorldState::new(config, 0).is_err());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut world = world();
        let (first, created) = world.connect_device(DeviceId::new("phone").unwrap());
        assert!(created);
        let (again, created) = world.connect_device(DeviceId::new("phone").unwrap());
        assert!(!created);
        assert_eq!(first, again);

        let (second, _) = world.connect_device(DeviceId::new("laptop").unwrap());
        assert_eq!(second.position, Position::new(120.0, 500.0));
        assert_eq!(second.connected_to, Some(ap("AP1")));
    }

    #[test]
    fn test_clamped_setters() {
        let mut world = world();
        assert_eq!(world.set_tolerance(1).secs(), 5);
        assert_eq!(world.set_tolerance(10_000).secs(), 300);
        assert_eq!(world.set_evil_probability(150.0), 1.0);
        assert_eq!(world.set_evil_probability(-3.0), 0.0);
        assert_eq!(world.set_evil_probability(f64::NAN), 0.0);
        assert!((world.set_evil_probability(25.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_sensitivity_swaps_whole_profile() {
        let mut world = world();
        let before = world.profile();
        let after = world.set_sensitivity(Sensitivity::Sensitive);
        assert_eq!(before.mode, Sensitivity::Non);
        assert_eq!(*after, SensitivityProfile::for_mode(Sensitivity::Sensitive));
        assert_eq!(world.profile().params.breach_penalty, 75.0);
    }

    #[test]
    fn test_toggle_side_effects() {
        let mut world = world();
        let id = ap("AP2");
        world.avoided.insert(id.clone());

        assert_eq!(world.toggle_legitimacy(&id), Some(false));
        assert_eq!(world.counters().spoofers_spawned, 1);
        assert!(!world.trusted_repo().contains_key(&id));

        assert_eq!(world.toggle_legitimacy(&id), Some(true));
        assert!(!world.avoided().contains(&id));
        assert_eq!(world.counters().spoofers_spawned, 1);

        assert_eq!(world.toggle_legitimacy(&ap("AP42")), None);
    }

    #[test]
    fn test_despawn_removes_everywhere() {
        let mut world = world();
        let id = add_guest(&mut world, "AP1_guest_0001_0", true);
        world.avoided.insert(id.clone());
        world.snapshot(0);
        assert!(world.router().last(&id).is_some());

        let removed = world.despawn_guest(&id).unwrap();
        assert_eq!(removed.id(), &id);
        assert!(!world.registry().contains(&id));
        assert!(world.detector(&id).is_none());
        assert!(!world.avoided().contains(&id));
        assert!(world.router().last(&id).is_none());

        assert!(world.despawn_guest(&id).is_none());
    }

    #[test]
    fn test_fixed_aps_never_despawn() {
        let mut world = world();
        assert!(world.despawn_guest(&ap("AP1")).is_none());
        assert!(world.registry().contains(&ap("AP1")));
    }

    #[test]
    fn test_snapshot_shape() {
        let mut world = world();
        add_guest(&mut world, "AP3_guest_0001_1", true);
        let snapshot = world.snapshot(5);
        assert_eq!(snapshot.detectors.len(), 7);
        assert_eq!(snapshot.ap_loads.len(), 7);
        assert_eq!(snapshot.router.len(), 7);
        assert_eq!(snapshot.active_evil_aps, 1);
        assert_eq!(snapshot.active_guest_aps, 1);
        assert_eq!(snapshot.mode_ends_at_ms, 30_000);
        // Prior 0.25 > 0.2 flags every AP, so only the evil guest is judged right.
        assert!((snapshot.detection_accuracy - 1.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_decay_and_tick_cost() {
        let mut world = world();
        world.registry.get_mut(&ap("AP1")).unwrap().add_load(5);
        world.decay_load(2);
        assert_eq!(world.registry().get(&ap("AP1")).unwrap().load(), 3);

        world.cost_since_last_tick = 12.5;
        assert_eq!(world.take_cost_since_last_tick(), 12.5);
        assert_eq!(world.take_cost_since_last_tick(), 0.0);
    }

    #[test]
    fn test_beacons_cover_every_ap() {
        let world = world();
        let beacons = world.beacons(1_000).unwrap();
        assert_eq!(beacons.len(), 6);
        for beacon in &beacons {
            let ap = world.registry().get(&beacon.ap).unwrap();
            assert!(beacon.verify(&ap.public_keys().signing).is_ok());
        }
    }
}
