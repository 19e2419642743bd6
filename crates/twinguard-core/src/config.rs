//! Configuration for the simulation.
//!
//! Options are grouped by the component that consumes them. Every group has
//! defaults matching the reference deployment, so an empty JSON object is a
//! valid configuration.
//!
//! # Example
//!
//! ```
//! use twinguard_core::config::{SimConfig, SimConfigBuilder};
//!
//! // Use defaults
//! let config = SimConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Or use builder for customization
//! let config = SimConfigBuilder::new()
//!     .with_timestamp_tolerance_secs(30)
//!     .with_packets_per_sec(10)
//!     .with_rng_seed(7)
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.traffic.tick_ms(), 100);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use twinguard_detector::DetectorConfig;
use twinguard_game::{Sensitivity, Strategy, DEFAULT_WINDOW_MS};
use twinguard_protocol::limits::{
    DEFAULT_TOLERANCE_SECS, MAX_REPLAY_ENTRIES, MAX_TOLERANCE_SECS, MIN_TOLERANCE_SECS,
    REPLAY_TTL_MS,
};

/// Default packets per second per device.
const DEFAULT_PACKETS_PER_SEC: u32 = 50;

/// Generators never tick faster than this.
pub const MIN_TICK_MS: u64 = 20;

/// Default guest batch interval.
const DEFAULT_SPAWN_INTERVAL_MS: u64 = 15_000;

/// Default guest lifetime.
const DEFAULT_DESPAWN_AFTER_MS: u64 = 60_000;

/// Largest batch a single spawn may create.
const MAX_GUESTS_PER_SPAWN: usize = 64;

/// Main simulation configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Packet protocol settings.
    pub protocol: ProtocolConfig,

    /// Per-device traffic generation.
    pub traffic: TrafficConfig,

    /// Strategy rotation.
    pub scheduler: SchedulerConfig,

    /// Guest AP spawning.
    pub adversary: AdversaryConfig,

    /// Periodic broadcasts and load decay.
    pub broadcast: BroadcastConfig,

    /// Parameters shared by every evil-twin detector.
    pub detector: DetectorConfig,

    /// Data sensitivity mode at startup.
    pub initial_sensitivity: Sensitivity,

    /// Seed for the world RNG. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl SimConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// Returns an error naming the first field that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tol = self.protocol.timestamp_tolerance_secs;
        if !(MIN_TOLERANCE_SECS..=MAX_TOLERANCE_SECS).contains(&tol) {
            return Err(ConfigError::invalid(
                "protocol.timestamp_tolerance_secs",
                format!("must be between {MIN_TOLERANCE_SECS} and {MAX_TOLERANCE_SECS}"),
            ));
        }
        if self.protocol.replay_ttl_ms == 0 {
            return Err(ConfigError::invalid(
                "protocol.replay_ttl_ms",
                "replay TTL must be greater than zero",
            ));
        }
        if self.protocol.replay_capacity == 0 {
            return Err(ConfigError::invalid(
                "protocol.replay_capacity",
                "replay capacity must be greater than zero",
            ));
        }

        if self.traffic.packets_per_sec == 0 {
            return Err(ConfigError::invalid(
                "traffic.packets_per_sec",
                "packet rate must be greater than zero",
            ));
        }
        if self.traffic.min_tick_ms < MIN_TICK_MS {
            return Err(ConfigError::invalid(
                "traffic.min_tick_ms",
                format!("minimum tick must be at least {MIN_TICK_MS} ms"),
            ));
        }

        if self.scheduler.window_ms == 0 {
            return Err(ConfigError::invalid(
                "scheduler.window_ms",
                "strategy window must be greater than zero",
            ));
        }

        let adversary = &self.adversary;
        if adversary.spawn_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "adversary.spawn_interval_ms",
                "spawn interval must be greater than zero",
            ));
        }
        if adversary.guests_per_spawn > MAX_GUESTS_PER_SPAWN {
            return Err(ConfigError::invalid(
                "adversary.guests_per_spawn",
                format!("at most {MAX_GUESTS_PER_SPAWN} guests per batch"),
            ));
        }
        if !unit_interval(adversary.evil_probability) {
            return Err(ConfigError::invalid(
                "adversary.evil_probability",
                "probability must be between 0.0 and 1.0",
            ));
        }
        if !unit_interval(adversary.spawn_probability) {
            return Err(ConfigError::invalid(
                "adversary.spawn_probability",
                "probability must be between 0.0 and 1.0",
            ));
        }
        if !(adversary.offset_distance.is_finite() && adversary.offset_distance >= 0.0)
            || !(adversary.offset_jitter.is_finite() && adversary.offset_jitter >= 0.0)
        {
            return Err(ConfigError::invalid(
                "adversary.offset_distance",
                "offsets must be finite and non-negative",
            ));
        }

        let broadcast = &self.broadcast;
        for (field, value) in [
            ("broadcast.beacon_interval_ms", broadcast.beacon_interval_ms),
            ("broadcast.stats_interval_ms", broadcast.stats_interval_ms),
            ("broadcast.load_decay_interval_ms", broadcast.load_decay_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "interval must be greater than zero"));
            }
        }
        if broadcast.event_capacity == 0 {
            return Err(ConfigError::invalid(
                "broadcast.event_capacity",
                "event channel capacity must be greater than zero",
            ));
        }

        let prior = self.detector.prior_evil;
        if !(prior > 0.0 && prior < 1.0) {
            return Err(ConfigError::invalid(
                "detector.prior_evil",
                "prior must be strictly between 0.0 and 1.0",
            ));
        }
        for (field, p) in [
            ("detector.p_success_given_evil", self.detector.p_success_given_evil),
            ("detector.p_success_given_legit", self.detector.p_success_given_legit),
        ] {
            if !(p > 0.0 && p < 1.0) {
                return Err(ConfigError::invalid(
                    field,
                    "likelihood must be strictly between 0.0 and 1.0",
                ));
            }
        }

        Ok(())
    }
}

fn unit_interval(p: f64) -> bool {
    (0.0..=1.0).contains(&p)
}

/// Packet protocol settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Accepted clock difference for packet timestamps.
    pub timestamp_tolerance_secs: u64,

    /// Offset added to the wall clock for every timestamp the simulation
    /// issues. Negative values put the simulation behind real time.
    pub clock_skew_secs: i64,

    /// How long a nonce stays in an AP's replay window.
    pub replay_ttl_ms: u64,

    /// Maximum nonces held per AP.
    pub replay_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            clock_skew_secs: 0,
            replay_ttl_ms: REPLAY_TTL_MS,
            replay_capacity: MAX_REPLAY_ENTRIES,
        }
    }
}

/// Per-device traffic generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Target packets per second for each connected device.
    pub packets_per_sec: u32,

    /// Lower bound on the generator tick.
    pub min_tick_ms: u64,

    /// Plaintext carried by every generated packet.
    pub payload: String,
}

impl TrafficConfig {
    /// Generator tick: `max(min_tick_ms, 1000 / packets_per_sec)`, never
    /// below [`MIN_TICK_MS`].
    pub fn tick_ms(&self) -> u64 {
        let per_packet = 1000 / u64::from(self.packets_per_sec.max(1));
        per_packet.max(self.min_tick_ms).max(MIN_TICK_MS)
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            packets_per_sec: DEFAULT_PACKETS_PER_SEC,
            min_tick_ms: MIN_TICK_MS,
            payload: "micro-pkt".to_string(),
        }
    }
}

/// Strategy rotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Strategy active at startup.
    pub initial_strategy: Strategy,

    /// Length of each strategy window.
    pub window_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_strategy: Strategy::Trust,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Guest AP spawning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversaryConfig {
    /// Run the periodic spawner. Manual spawns work either way.
    pub enabled: bool,

    /// Time between periodic batches.
    pub spawn_interval_ms: u64,

    /// Guests attempted per batch.
    pub guests_per_spawn: usize,

    /// Probability each guest is malicious. Adjustable at runtime.
    pub evil_probability: f64,

    /// Guest lifetime.
    pub despawn_after_ms: u64,

    /// Probability each attempted guest is actually created.
    pub spawn_probability: f64,

    /// Minimum distance from the impersonated AP.
    pub offset_distance: f64,

    /// Uniform extra distance added on top of `offset_distance`.
    pub offset_jitter: f64,
}

impl Default for AdversaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spawn_interval_ms: DEFAULT_SPAWN_INTERVAL_MS,
            guests_per_spawn: 4,
            evil_probability: 0.40,
            despawn_after_ms: DEFAULT_DESPAWN_AFTER_MS,
            spawn_probability: 1.0,
            offset_distance: 120.0,
            offset_jitter: 60.0,
        }
    }
}

/// Periodic broadcasts and load decay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Signed beacon period.
    pub beacon_interval_ms: u64,

    /// Stats snapshot period.
    pub stats_interval_ms: u64,

    /// Load decay period.
    pub load_decay_interval_ms: u64,

    /// Load units removed from each AP per decay tick.
    pub load_decay_per_tick: u32,

    /// Buffered events per subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            beacon_interval_ms: 2_000,
            stats_interval_ms: 1_000,
            load_decay_interval_ms: 1_000,
            load_decay_per_tick: 2,
            event_capacity: 1_024,
        }
    }
}

/// Process-level settings file.
///
/// Uses the flat camelCase keys of the deployment config file. Absent keys
/// leave the corresponding [`SimConfig`] value untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Listening port. Accepted for compatibility; the stdio transport
    /// ignores it.
    pub port: Option<u16>,

    /// Initial timestamp tolerance.
    pub timestamp_tolerance_secs: Option<u64>,

    /// Clock skew applied to issued timestamps.
    pub server_clock_skew_secs: Option<i64>,

    /// Packets per second per device.
    pub packet_burst_rate_per_device: Option<u32>,

    /// Full simulation config, for settings without a flat key.
    pub simulation: Option<SimConfig>,
}

impl ProcessConfig {
    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Fold into a simulation config. Flat keys win over `simulation`.
    pub fn into_sim_config(self) -> SimConfig {
        let mut config = self.simulation.unwrap_or_default();
        if let Some(secs) = self.timestamp_tolerance_secs {
            config.protocol.timestamp_tolerance_secs =
                secs.clamp(MIN_TOLERANCE_SECS, MAX_TOLERANCE_SECS);
        }
        if let Some(skew) = self.server_clock_skew_secs {
            config.protocol.clock_skew_secs = skew;
        }
        if let Some(rate) = self.packet_burst_rate_per_device {
            config.traffic.packets_per_sec = rate;
        }
        config
    }
}

/// Builder for [`SimConfig`].
#[derive(Clone, Debug, Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Build without validation.
    pub fn build(self) -> SimConfig {
        self.config
    }

    /// Build and validate.
    pub fn build_validated(self) -> Result<SimConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }

    // ===== Protocol =====

    /// Set the timestamp tolerance.
    pub fn with_timestamp_tolerance_secs(mut self, secs: u64) -> Self {
        self.config.protocol.timestamp_tolerance_secs = secs;
        self
    }

    /// Set the clock skew.
    pub fn with_clock_skew_secs(mut self, secs: i64) -> Self {
        self.config.protocol.clock_skew_secs = secs;
        self
    }

    // ===== Traffic =====

    /// Set the per-device packet rate.
    pub fn with_packets_per_sec(mut self, rate: u32) -> Self {
        self.config.traffic.packets_per_sec = rate;
        self
    }

    /// Set the generated plaintext.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.config.traffic.payload = payload.into();
        self
    }

    // ===== Scheduler =====

    /// Set the strategy active at startup.
    pub fn with_initial_strategy(mut self, strategy: Strategy) -> Self {
        self.config.scheduler.initial_strategy = strategy;
        self
    }

    /// Set the strategy window length.
    pub fn with_strategy_window_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.window_ms = ms;
        self
    }

    // ===== Adversary =====

    /// Run the periodic spawner.
    pub fn enable_adversary(mut self) -> Self {
        self.config.adversary.enabled = true;
        self
    }

    /// Only spawn guests on manual request.
    pub fn disable_adversary(mut self) -> Self {
        self.config.adversary.enabled = false;
        self
    }

    /// Set the probability each guest is malicious.
    pub fn with_evil_probability(mut self, p: f64) -> Self {
        self.config.adversary.evil_probability = p;
        self
    }

    /// Set the batch size.
    pub fn with_guests_per_spawn(mut self, n: usize) -> Self {
        self.config.adversary.guests_per_spawn = n;
        self
    }

    /// Set the guest lifetime.
    pub fn with_despawn_after_ms(mut self, ms: u64) -> Self {
        self.config.adversary.despawn_after_ms = ms;
        self
    }

    /// Set the periodic batch interval.
    pub fn with_spawn_interval_ms(mut self, ms: u64) -> Self {
        self.config.adversary.spawn_interval_ms = ms;
        self
    }

    // ===== Misc =====

    /// Set the startup sensitivity mode.
    pub fn with_sensitivity(mut self, mode: Sensitivity) -> Self {
        self.config.initial_sensitivity = mode;
        self
    }

    /// Seed the world RNG.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Set the detector parameters.
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol.timestamp_tolerance_secs, 60);
        assert_eq!(config.traffic.packets_per_sec, 50);
        assert_eq!(config.scheduler.window_ms, 30_000);
        assert_eq!(config.adversary.guests_per_spawn, 4);
        assert_eq!(config.adversary.evil_probability, 0.40);
        assert_eq!(config.adversary.despawn_after_ms, 60_000);
        assert_eq!(config.initial_sensitivity, Sensitivity::Non);
    }

    #[test]
    fn test_tick_has_floor() {
        let mut traffic = TrafficConfig::default();
        assert_eq!(traffic.tick_ms(), 20);

        traffic.packets_per_sec = 1_000;
        assert_eq!(traffic.tick_ms(), 20);

        traffic.packets_per_sec = 4;
        assert_eq!(traffic.tick_ms(), 250);

        // A lowered bound cannot push the generator past the floor
        traffic.packets_per_sec = 1_000;
        traffic.min_tick_ms = 1;
        assert_eq!(traffic.tick_ms(), MIN_TICK_MS);
    }

    #[test]
    fn test_validation_rejects_fast_tick() {
        let mut config = SimConfigBuilder::new().with_packets_per_sec(1_000).build();
        config.traffic.min_tick_ms = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "traffic.min_tick_ms"
        ));

        config.traffic.min_tick_ms = MIN_TICK_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let bad_tolerance = SimConfigBuilder::new()
            .with_timestamp_tolerance_secs(301)
            .build_validated();
        assert!(matches!(
            bad_tolerance,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "protocol.timestamp_tolerance_secs"
        ));

        assert!(SimConfigBuilder::new()
            .with_evil_probability(1.5)
            .build_validated()
            .is_err());
        assert!(SimConfigBuilder::new()
            .with_packets_per_sec(0)
            .build_validated()
            .is_err());
        assert!(SimConfigBuilder::new()
            .with_guests_per_spawn(65)
            .build_validated()
            .is_err());

        let mut config = SimConfig::default();
        config.detector.prior_evil = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = SimConfigBuilder::new()
            .with_clock_skew_secs(-5)
            .with_initial_strategy(Strategy::Avoid)
            .with_sensitivity(Sensitivity::Sensitive)
            .disable_adversary()
            .with_rng_seed(42)
            .build_validated()
            .unwrap();

        assert_eq!(config.protocol.clock_skew_secs, -5);
        assert_eq!(config.scheduler.initial_strategy, Strategy::Avoid);
        assert_eq!(config.initial_sensitivity, Sensitivity::Sensitive);
        assert!(!config.adversary.enabled);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"traffic": {"packets_per_sec": 5}}"#).unwrap();
        assert_eq!(config.traffic.packets_per_sec, 5);
        assert_eq!(config.traffic.min_tick_ms, 20);
        assert_eq!(config.protocol, ProtocolConfig::default());
    }

    #[test]
    fn test_process_config_keys() {
        let process = ProcessConfig::from_json(
            r#"{
                "port": 3000,
                "timestampToleranceSecs": 900,
                "serverClockSkewSecs": 3,
                "packetBurstRatePerDevice": 10
            }"#,
        )
        .unwrap();
        assert_eq!(process.port, Some(3000));

        let config = process.into_sim_config();
        assert_eq!(config.protocol.timestamp_tolerance_secs, 300);
        assert_eq!(config.protocol.clock_skew_secs, 3);
        assert_eq!(config.traffic.packets_per_sec, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_process_config_parse_error() {
        assert!(matches!(
            ProcessConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let original = SimConfigBuilder::new()
            .with_payload("hello")
            .with_spawn_interval_ms(5_000)
            .build();
        let json = serde_json::to_string(&original).unwrap();
        let restored: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }
}
