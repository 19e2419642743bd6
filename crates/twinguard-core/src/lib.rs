//! # twinguard-core
//!
//! Evil-twin access point simulation for TwinGuard.
//!
//! This is the main entry point for applications driving the simulation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use twinguard_core::{Command, SimConfigBuilder, Simulation};
//! use twinguard_game::Sensitivity;
//!
//! # async fn run() -> twinguard_core::Result<()> {
//! let config = SimConfigBuilder::new()
//!     .with_timestamp_tolerance_secs(30)
//!     .with_sensitivity(Sensitivity::Sensitive)
//!     .build_validated()?;
//!
//! let sim = Simulation::new(config)?;
//! sim.start().await;
//!
//! let response = sim
//!     .execute(Command::parse(r#"{"cmd":"connectDevice","id":"phone"}"#)?)
//!     .await;
//! println!("{}", serde_json::to_string(&response).unwrap_or_default());
//!
//! sim.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **WorldState**: registry, devices, detectors, avoided set, strategy
//!   schedule, router and counters, mutated as one unit
//! - **traffic**: one packet per generator tick, from destination choice
//!   through protocol verification, pricing and detector update
//! - **adversary**: guest AP batches and their removal
//! - **Simulation**: async handle that runs the periodic tasks, answers
//!   [`Command`]s and broadcasts [`Event`]s

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adversary;
pub mod clock;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod registry;
pub mod simulation;
pub mod stats;
pub mod traffic;
pub mod world;

// Main handle export
pub use simulation::Simulation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{ApInfo, Command, Response, TrustedEntry};
pub use config::{
    AdversaryConfig, BroadcastConfig, ConfigError, ProcessConfig, ProtocolConfig,
    SchedulerConfig, SimConfig, SimConfigBuilder, TrafficConfig,
};
pub use device::{Device, DeviceRecord, KeyView};
pub use error::{CoreError, Result};
pub use events::{BeaconEvent, Event, GuestDespawn, GuestSpawn, PacketEvent};
pub use registry::{AccessPoint, ApRegistry, ApRole, Position};
pub use stats::{Counters, DetectorSnapshot, StatsSnapshot};
pub use world::WorldState;

// Re-export identifier types for convenience
pub use twinguard_identity::{ApId, DeviceId};
