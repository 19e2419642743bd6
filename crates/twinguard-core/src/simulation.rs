//! Async driver around [`WorldState`].
//!
//! A [`Simulation`] is a cheap, cloneable handle. World state sits behind a
//! single `tokio` `RwLock`; every mutation (a packet, a spawn, a despawn, a
//! sensitivity swap) holds the write lock for its whole duration, so no
//! reader ever sees half of one.
//!
//! # Tasks
//!
//! [`Simulation::start`] launches the periodic work:
//!
//! | Task | Period |
//! |------|--------|
//! | strategy rotation | `scheduler.window_ms` |
//! | guest spawn | `adversary.spawn_interval_ms` (when enabled) |
//! | load decay | `broadcast.load_decay_interval_ms` |
//! | beacons | `broadcast.beacon_interval_ms` |
//! | stats | `broadcast.stats_interval_ms` |
//! | one generator per device | `traffic.tick_ms()` |
//!
//! Each spawned guest also gets a one-shot despawn timer. Every task stops
//! when [`Simulation::shutdown`] is called.
//!
//! # Example
//!
//! ```no_run
//! use twinguard_core::{Simulation, SimConfig};
//!
//! # async fn run() -> twinguard_core::Result<()> {
//! let sim = Simulation::new(SimConfig::default())?;
//! let mut events = sim.subscribe();
//! sim.start().await;
//!
//! let device = "laptop".parse()?;
//! sim.connect_device(device).await;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use twinguard_game::{Sensitivity, SensitivityProfile};
use twinguard_identity::{ApId, DeviceId};
use twinguard_protocol::Tolerance;

use crate::adversary;
use crate::clock::{Clock, SystemClock};
use crate::commands::{ApInfo, Command, Response, TrustedEntry};
use crate::config::SimConfig;
use crate::device::DeviceRecord;
use crate::events::{BeaconEvent, Event, GuestSpawn, PacketEvent};
use crate::stats::StatsSnapshot;
use crate::traffic;
use crate::world::WorldState;
use crate::{CoreError, Result};

struct Inner {
    state: RwLock<WorldState>,
    events: broadcast::Sender<Event>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    generators: Mutex<HashMap<DeviceId, JoinHandle<()>>>,
}

/// Handle to a running (or ready to run) simulation.
#[derive(Clone)]
pub struct Simulation {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("started", &self.is_started())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Build a simulation on the skewed wall clock.
    pub fn new(config: SimConfig) -> Result<Self> {
        let clock = Arc::new(SystemClock::with_skew_secs(config.protocol.clock_skew_secs));
        Self::with_clock(config, clock)
    }

    /// Build a simulation on a caller-supplied clock.
    pub fn with_clock(config: SimConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let capacity = config.broadcast.event_capacity.max(1);
        let state = WorldState::new(config, clock.now_ms())?;
        let (events, _) = broadcast::channel(capacity);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                events,
                clock,
                shutdown,
                started: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                generators: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Current simulation time, Unix milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Whether [`start`](Self::start) has run.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Run `f` against a read-locked view of the world.
    pub async fn with_state<R>(&self, f: impl FnOnce(&WorldState) -> R) -> R {
        let state = self.inner.state.read().await;
        f(&state)
    }

    fn emit(&self, event: Event) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    // ===== Lifecycle =====

    /// Launch the periodic tasks. Calling it again does nothing.
    pub async fn start(&self) {
        if self.is_shut_down() || self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let (scheduler, adversary, broadcast) = self
            .with_state(|w| {
                let c = w.config();
                (c.scheduler.clone(), c.adversary.clone(), c.broadcast.clone())
            })
            .await;

        let mut tasks = vec![
            self.spawn_periodic("rotation", scheduler.window_ms, |sim| async move {
                sim.rotate_strategy().await;
            }),
            self.spawn_periodic("load-decay", broadcast.load_decay_interval_ms, |sim| async move {
                sim.decay_load().await;
            }),
            self.spawn_periodic("beacons", broadcast.beacon_interval_ms, |sim| async move {
                sim.broadcast_beacons().await;
            }),
            self.spawn_periodic("stats", broadcast.stats_interval_ms, |sim| async move {
                sim.broadcast_stats().await;
            }),
        ];
        if adversary.enabled {
            tasks.push(self.spawn_periodic(
                "spawner",
                adversary.spawn_interval_ms,
                |sim| async move {
                    sim.spawn_guests().await;
                },
            ));
        }
        self.inner.tasks.lock().await.extend(tasks);

        let devices: Vec<DeviceId> = self
            .with_state(|w| w.device_records().into_iter().map(|d| d.id).collect())
            .await;
        for device in devices {
            self.start_generator(device).await;
        }

        info!("simulation started");
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        let mut handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().await.drain(..).collect();
        handles.extend(self.inner.generators.lock().await.drain().map(|(_, h)| h));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "task ended abnormally");
            }
        }
        info!("simulation stopped");
    }

    fn spawn_periodic<F, Fut>(&self, name: &'static str, period_ms: u64, mut step: F) -> JoinHandle<()>
    where
        F: FnMut(Simulation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sim = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            // A receiver created after the flag flipped never sees a change.
            if *shutdown.borrow_and_update() {
                debug!(task = name, "periodic task not started after shutdown");
                return;
            }
            let period = Duration::from_millis(period_ms.max(1));
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => step(sim.clone()).await,
                    _ = shutdown.changed() => break,
                }
            }
            debug!(task = name, "periodic task stopped");
        })
    }

    async fn start_generator(&self, device: DeviceId) {
        let mut generators = self.inner.generators.lock().await;
        // shutdown() drains this map after setting the flag, so a handle
        // inserted past this check is always collected.
        if self.is_shut_down() || generators.contains_key(&device) {
            return;
        }
        let tick_ms = self.with_state(|w| w.config().traffic.tick_ms()).await;
        let id = device.clone();
        let handle = self.spawn_periodic("generator", tick_ms, move |sim| {
            let id = id.clone();
            async move {
                sim.tick_device(&id).await;
            }
        });
        debug!(device = %device, tick_ms, "packet generator started");
        generators.insert(device, handle);
    }

    fn schedule_despawn(&self, guest: ApId, after_ms: u64) {
        let sim = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(after_ms)) => {
                    sim.despawn_guest(&guest).await;
                }
                _ = shutdown.changed() => {}
            }
        });
    }

    // ===== Periodic steps =====

    /// Send one packet from `device` and emit it.
    pub async fn tick_device(&self, device: &DeviceId) -> Option<PacketEvent> {
        let now = self.now_ms();
        let event = {
            let mut state = self.inner.state.write().await;
            traffic::send_packet(&mut state, device, now)
        }?;
        self.emit(Event::PacketCreated(event.clone()));
        Some(event)
    }

    /// Advance the global strategy and announce it.
    pub async fn rotate_strategy(&self) {
        let now = self.now_ms();
        let (mode, ends_at_ms) = {
            let mut state = self.inner.state.write().await;
            let mode = state.rotate_strategy(now);
            (mode, state.schedule().window_ends_at_ms())
        };
        self.emit(Event::StrategyMode { mode, ends_at_ms });
    }

    /// Drain load from every AP.
    pub async fn decay_load(&self) {
        let mut state = self.inner.state.write().await;
        let units = state.config().broadcast.load_decay_per_tick;
        state.decay_load(units);
    }

    /// Emit a signed beacon for every AP.
    pub async fn broadcast_beacons(&self) {
        let now = self.now_ms();
        let beacons = self.with_state(|w| w.beacons(now)).await;
        match beacons {
            Ok(beacons) => self.emit(Event::Beacons(beacons.iter().map(BeaconEvent::from).collect())),
            Err(e) => warn!(error = %e, "failed to sign beacons"),
        }
    }

    /// Emit a stats snapshot and reset the per-tick cost.
    pub async fn broadcast_stats(&self) -> StatsSnapshot {
        let now = self.now_ms();
        let snapshot = {
            let mut state = self.inner.state.write().await;
            let snapshot = state.snapshot(now);
            state.take_cost_since_last_tick();
            snapshot
        };
        self.emit(Event::Stats(Box::new(snapshot.clone())));
        snapshot
    }

    /// Spawn one guest batch, announce it and arm the despawn timers.
    pub async fn spawn_guests(&self) -> Vec<GuestSpawn> {
        let now = self.now_ms();
        let (spawned, despawn_after_ms) = {
            let mut state = self.inner.state.write().await;
            let spawned = adversary::spawn_batch(&mut state, now);
            (spawned, state.config().adversary.despawn_after_ms)
        };
        for guest in &spawned {
            self.schedule_despawn(guest.id.clone(), despawn_after_ms);
            self.emit(Event::GuestSpawned(guest.clone()));
        }
        spawned
    }

    /// Remove a guest now. Returns `false` if it was already gone.
    pub async fn despawn_guest(&self, id: &ApId) -> bool {
        let removed = {
            let mut state = self.inner.state.write().await;
            adversary::despawn(&mut state, id)
        };
        match removed {
            Some(gone) => {
                self.emit(Event::GuestDespawned(gone));
                true
            }
            None => false,
        }
    }

    // ===== Commands =====

    /// Discovery listing.
    pub async fn get_aps(&self) -> Vec<ApInfo> {
        self.with_state(WorldState::ap_infos).await
    }

    /// Trusted repository.
    pub async fn get_trusted_repo(&self) -> std::collections::BTreeMap<ApId, TrustedEntry> {
        self.with_state(WorldState::trusted_repo).await
    }

    /// Create the device if needed and start its generator.
    pub async fn connect_device(&self, id: DeviceId) -> DeviceRecord {
        let (record, devices) = {
            let mut state = self.inner.state.write().await;
            let (record, _) = state.connect_device(id.clone());
            (record, state.device_records())
        };
        self.emit(Event::Devices(devices));
        if self.is_started() && !self.is_shut_down() {
            self.start_generator(id).await;
        }
        record
    }

    /// Set the timestamp tolerance.
    ///
    /// Zero or non-finite input keeps the current value; anything else is
    /// rounded and clamped to 5..=300 seconds.
    pub async fn set_tolerance(&self, seconds: f64) -> Tolerance {
        let mut state = self.inner.state.write().await;
        if !seconds.is_finite() || seconds == 0.0 {
            return state.tolerance();
        }
        let secs = seconds.round().max(0.0) as u64;
        state.set_tolerance(secs)
    }

    /// Swap the sensitivity profile and announce it.
    pub async fn set_sensitivity(&self, mode: Sensitivity) -> SensitivityProfile {
        let profile = {
            let mut state = self.inner.state.write().await;
            *state.set_sensitivity(mode)
        };
        self.emit(Event::SensitivityUpdated(profile));
        profile
    }

    /// Set the guest evil probability from a percentage and announce it.
    pub async fn set_evil_probability(&self, percent: f64) -> f64 {
        let evil_probability = self.inner.state.write().await.set_evil_probability(percent);
        self.emit(Event::EvilProbabilityUpdated { evil_probability });
        evil_probability
    }

    /// Flip an AP's legitimacy, announce it and re-beacon.
    pub async fn toggle_legitimacy(&self, id: &ApId) -> Result<bool> {
        let is_legitimate = self
            .inner
            .state
            .write()
            .await
            .toggle_legitimacy(id)
            .ok_or_else(|| CoreError::UnknownAp(id.clone()))?;
        self.emit(Event::LegitimacyToggled {
            id: id.clone(),
            is_legitimate,
        });
        self.broadcast_beacons().await;
        Ok(is_legitimate)
    }

    /// Stats snapshot without resetting the per-tick cost.
    pub async fn stats(&self) -> StatsSnapshot {
        let now = self.now_ms();
        self.inner.state.write().await.snapshot(now)
    }

    /// Run one transport command.
    ///
    /// Bad identifiers, unknown modes and unknown APs are logged and
    /// answered with [`Response::Ignored`].
    pub async fn execute(&self, command: Command) -> Response {
        if self.is_shut_down() {
            return ignored(command.name(), CoreError::ShutDown.to_string());
        }
        match command {
            Command::GetAps => Response::Aps(self.get_aps().await),
            Command::GetTrustedRepo => Response::TrustedRepo(self.get_trusted_repo().await),
            Command::ConnectDevice { id } => match id.parse::<DeviceId>() {
                Ok(id) => Response::DeviceConnected(self.connect_device(id).await),
                Err(e) => ignored("connectDevice", e.to_string()),
            },
            Command::SetTolerance { seconds } => {
                self.set_tolerance(seconds).await;
                Response::Ack
            }
            Command::SetSensitivity { mode } => match mode.parse::<Sensitivity>() {
                Ok(mode) => {
                    self.set_sensitivity(mode).await;
                    Response::Ack
                }
                Err(e) => ignored("setSensitivity", e.to_string()),
            },
            Command::SetEvilProbability { percent } => {
                self.set_evil_probability(percent).await;
                Response::Ack
            }
            Command::ManualToggleEvil { id } => {
                let result = match id.parse::<ApId>() {
                    Ok(id) => self.toggle_legitimacy(&id).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                };
                match result {
                    Ok(()) => Response::Ack,
                    Err(e) => ignored("manualToggleEvil", e.to_string()),
                }
            }
            Command::ManualSpawnEvil => {
                self.spawn_guests().await;
                Response::Ack
            }
            Command::StatsRequest => Response::Stats(Box::new(self.stats().await)),
        }
    }
}

fn ignored(command: &str, reason: String) -> Response {
    warn!(command, %reason, "command ignored");
    Response::Ignored { reason }
}
