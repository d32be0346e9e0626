//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::model::{NodeSnapshot, PowerState};

/// Upper bound (inclusive) of the outage band.
pub const OUTAGE_MAX_VOLTS: f64 = 10.0;
/// Lower bound (inclusive) of the low band; anything below is very low.
pub const LOW_MIN_VOLTS: f64 = 170.0;
/// Lower bound (inclusive) of the normal band.
pub const NORMAL_MIN_VOLTS: f64 = 200.0;

/// Operational label shown for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Normal,
    Low,
    VeryLow,
    Outage,
    Offline,
}

impl Label {
    /// Severity tier; higher is more alarming.
    pub fn severity_rank(self) -> u8 {
        match self {
            Label::Normal => 0,
            Label::Low | Label::Offline => 2,
            Label::VeryLow => 3,
            Label::Outage => 4,
        }
    }
}

/// Derived label and severity for one snapshot. Never stored across polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub severity_rank: u8,
}

impl From<Label> for Classification {
    fn from(label: Label) -> Self {
        Self {
            label,
            severity_rank: label.severity_rank(),
        }
    }
}

/// Classify a node reading.
///
/// Precedence, highest first:
/// 1. power `OFF`/`OUTAGE` → `OUTAGE`, whatever the voltage or connectivity;
/// 2. voltage `<= 10` → `OUTAGE`, also whatever the connectivity;
/// 3. disconnected → `OFFLINE`;
/// 4. voltage bands: `(10, 170)` very low, `[170, 200)` low, `>= 200` normal.
///
/// A non-finite voltage is read as `0.0`, which lands in the outage band.
pub fn classify(voltage: f64, power: PowerState, connected: bool) -> Classification {
    let voltage = if voltage.is_finite() { voltage } else { 0.0 };

    if power.forces_outage() || voltage <= OUTAGE_MAX_VOLTS {
        return Label::Outage.into();
    }
    if !connected {
        return Label::Offline.into();
    }
    voltage_band(voltage).into()
}

/// Classify a normalised snapshot.
pub fn classify_snapshot(node: &NodeSnapshot) -> Classification {
    classify(node.voltage, node.power, node.connected)
}

/// Band of a reading already known to be above the outage threshold.
fn voltage_band(voltage: f64) -> Label {
    if voltage < LOW_MIN_VOLTS {
        Label::VeryLow
    } else if voltage < NORMAL_MIN_VOLTS {
        Label::Low
    } else {
        Label::Normal
    }
}
