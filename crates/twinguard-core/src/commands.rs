//! Inbound commands and their replies.
//!
//! Commands arrive as JSON objects tagged by `cmd`:
//!
//! ```
//! use twinguard_core::commands::Command;
//!
//! let cmd = Command::parse(r#"{"cmd": "setTolerance", "seconds": 30}"#).unwrap();
//! assert_eq!(cmd, Command::SetTolerance { seconds: 30.0 });
//!
//! let cmd = Command::parse(r#"{"cmd": "getAPs"}"#).unwrap();
//! assert_eq!(cmd, Command::GetAps);
//! ```
//!
//! Identifiers and mode names are carried as plain strings and checked when
//! the command runs, so a bad value yields [`Response::Ignored`] instead of a
//! parse failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use twinguard_identity::ApId;

use crate::device::{DeviceRecord, KeyView};
use crate::registry::{AccessPoint, Position};
use crate::stats::StatsSnapshot;
use crate::{CoreError, Result};

/// A request from the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    /// Discovery listing of every AP.
    #[serde(rename = "getAPs")]
    GetAps,
    /// Public keys of the fixed legitimate APs.
    GetTrustedRepo,
    /// Create a device if needed and start its traffic.
    ConnectDevice {
        /// Device id.
        id: String,
    },
    /// Set the timestamp tolerance, clamped to 5..=300 seconds.
    SetTolerance {
        /// Seconds.
        seconds: f64,
    },
    /// Switch the data sensitivity mode.
    SetSensitivity {
        /// `non` or `sensitive`.
        mode: String,
    },
    /// Set the guest evil probability, clamped to 0..=100 percent.
    SetEvilProbability {
        /// Percent.
        percent: f64,
    },
    /// Flip an AP's legitimacy.
    ManualToggleEvil {
        /// AP id.
        id: String,
    },
    /// Spawn a guest batch now.
    ManualSpawnEvil,
    /// Full stats snapshot.
    StatsRequest,
}

impl Command {
    /// Decode one JSON command.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CoreError::InvalidCommand(e.to_string()))
    }

    /// Command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetAps => "getAPs",
            Command::GetTrustedRepo => "getTrustedRepo",
            Command::ConnectDevice { .. } => "connectDevice",
            Command::SetTolerance { .. } => "setTolerance",
            Command::SetSensitivity { .. } => "setSensitivity",
            Command::SetEvilProbability { .. } => "setEvilProbability",
            Command::ManualToggleEvil { .. } => "manualToggleEvil",
            Command::ManualSpawnEvil => "manualSpawnEvil",
            Command::StatsRequest => "statsRequest",
        }
    }
}

/// Reply to a [`Command`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Response {
    /// Discovery listing.
    #[serde(rename = "aps")]
    Aps(Vec<ApInfo>),
    /// Trusted repository.
    TrustedRepo(BTreeMap<ApId, TrustedEntry>),
    /// The connected device.
    DeviceConnected(DeviceRecord),
    /// Stats snapshot.
    Stats(Box<StatsSnapshot>),
    /// Accepted; effects are announced as events.
    Ack,
    /// Input was not acted on.
    Ignored {
        /// Why.
        reason: String,
    },
}

/// Discovery entry for one AP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApInfo {
    /// Identifier.
    pub id: ApId,
    /// Location.
    pub position: Position,
    /// Public keys.
    pub public_keys: KeyView,
    /// Currently behaving.
    pub is_legitimate: bool,
    /// Transient guest.
    pub is_guest: bool,
    /// Impersonated AP, for guests.
    pub mimicking: Option<ApId>,
    /// Advertised signal strength.
    pub signal_strength: u32,
    /// Detector posterior, 0 when no detector exists.
    pub detector_belief: f64,
    /// Load as percent of capacity.
    pub load_percent: f64,
}

impl ApInfo {
    /// View of `ap` with the given detector belief.
    pub fn new(ap: &AccessPoint, detector_belief: f64) -> Self {
        Self {
            id: ap.id().clone(),
            position: ap.position(),
            public_keys: KeyView::from(ap.public_keys()),
            is_legitimate: ap.is_legitimate(),
            is_guest: ap.is_guest(),
            mimicking: ap.role().mimicking().cloned(),
            signal_strength: ap.signal_strength(),
            detector_belief,
            load_percent: ap.load_percent(),
        }
    }
}

/// Trusted repository entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedEntry {
    /// Identifier.
    pub id: ApId,
    /// Public keys.
    pub public_keys: KeyView,
    /// Always true.
    pub is_legitimate: bool,
}
