//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Wire records as the server sends them, and the normalised snapshots the engine consumes.
//!
//! Normalisation happens exactly once, here. Downstream components never look at raw
//! strings: power and verification states are closed enums, voltage is always a finite
//! number, and the region always has a value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::errors::IngestError;

/// Sentinel region for nodes that have not been configured yet.
pub const UNKNOWN_REGION: &str = "Unknown";

/// Identifier used for a single device that has not been assigned an identity.
pub const UNCONFIGURED_DEVICE_ID: &str = "unconfigured";

/// Reported power condition of a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PowerState {
    Normal,
    Low,
    Off,
    Outage,
}

impl PowerState {
    /// Normalise a raw power string. Missing or unrecognised values become `Outage` so an
    /// unknown condition is never shown as healthy.
    pub fn normalize(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .and_then(|value| value.parse::<PowerState>().ok())
            .unwrap_or(PowerState::Outage)
    }

    /// `OFF` and `OUTAGE` force an outage regardless of voltage.
    pub fn forces_outage(self) -> bool {
        matches!(self, PowerState::Off | PowerState::Outage)
    }
}

/// Server-held verification workflow state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum VerificationStatus {
    #[default]
    None,
    Pending,
    Confirmed,
}

/// One node's state for one polling cycle, after normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub connected: bool,
    pub voltage: f64,
    pub power: PowerState,
    pub region: String,
    pub last_seen: Option<String>,
    /// `None` when the payload carried no verification field; the local cache is left alone.
    pub verification: Option<VerificationStatus>,
    pub logs: Vec<String>,
}

impl NodeSnapshot {
    /// Whether the region is still the unconfigured sentinel.
    pub fn is_unconfigured(&self) -> bool {
        self.region == UNKNOWN_REGION
    }
}

/// Raw node record accepted from both `/status` (single device) and `/nodes` (dashboard).
///
/// Both payload shapes are tolerated: a dedicated `voltage`/`region` pair, or the combined
/// `transformer` string (`"230.5V | Addis Ababa"`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    #[serde(default, alias = "nodeId")]
    pub id: Option<String>,
    #[serde(default)]
    pub connected: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::voltage")]
    pub voltage: Option<f64>,
    #[serde(default, alias = "powerState")]
    pub power: Option<String>,
    #[serde(default)]
    pub transformer: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub verification_status: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl NodeRecord {
    /// Normalise a dashboard record. Records without an identifier cannot be tracked.
    pub fn into_snapshot(self) -> Result<NodeSnapshot, IngestError> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or(IngestError::MissingId)?;
        Ok(self.normalise(id))
    }

    /// Normalise the single-device payload, which may not have an identity yet.
    pub fn into_device_snapshot(self) -> NodeSnapshot {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(UNCONFIGURED_DEVICE_ID)
            .to_owned();
        self.normalise(id)
    }

    fn normalise(self, id: String) -> NodeSnapshot {
        let (transformer_voltage, transformer_region) = self
            .transformer
            .as_deref()
            .map(split_transformer)
            .unwrap_or((None, None));

        let connected = match (self.connected, self.status.as_deref()) {
            (Some(flag), _) => flag,
            (None, Some(status)) => status.trim().eq_ignore_ascii_case("ONLINE"),
            (None, None) => false,
        };

        let voltage = self.voltage.or(transformer_voltage).unwrap_or(0.0);
        let region = configured_region(self.region.as_deref())
            .or(transformer_region)
            .unwrap_or_else(|| UNKNOWN_REGION.to_owned());

        let verification = self
            .verification_status
            .as_deref()
            .map(str::trim)
            .and_then(|raw| {
                if raw.is_empty() {
                    Some(VerificationStatus::None)
                } else {
                    raw.parse::<VerificationStatus>().ok()
                }
            });

        NodeSnapshot {
            id,
            connected,
            voltage,
            power: PowerState::normalize(self.power.as_deref()),
            region,
            last_seen: self.last_seen.filter(|value| !value.trim().is_empty()),
            verification,
            logs: self.logs,
        }
    }
}

/// Parse a voltage reading such as `230.5`, `"230.5V"` or `" 12 v "`.
pub fn parse_voltage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches(['V', 'v']).trim();
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Split the combined `"<voltage> | <region>"` transformer string.
pub fn split_transformer(raw: &str) -> (Option<f64>, Option<String>) {
    let mut parts = raw.splitn(2, '|');
    let voltage = parts.next().and_then(parse_voltage);
    let region = configured_region(parts.next());
    (voltage, region)
}

fn configured_region(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|region| !region.is_empty() && *region != UNKNOWN_REGION)
        .map(str::to_owned)
}

/// Leader/follower information from `/stats`. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    #[serde(deserialize_with = "lenient::required_string")]
    pub server_id: String,
    #[serde(default)]
    pub is_leader: bool,
}

impl ClusterStats {
    pub fn badge(&self) -> &'static str {
        if self.is_leader {
            "LEADER (Primary)"
        } else {
            "FOLLOWER (Backup)"
        }
    }
}

/// Everything one successful poll produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotSet {
    pub nodes: Vec<NodeSnapshot>,
    pub cluster: Option<ClusterStats>,
    /// Records dropped during ingest because they could not be identified.
    pub rejected: usize,
}

impl SnapshotSet {
    /// Build a set from the single-device `/status` payload.
    pub fn device(record: NodeRecord) -> Self {
        Self {
            nodes: vec![record.into_device_snapshot()],
            cluster: None,
            rejected: 0,
        }
    }

    /// Build a set from the dashboard `/nodes` payload, dropping unidentifiable records.
    pub fn dashboard(records: Vec<NodeRecord>, cluster: Option<ClusterStats>) -> Self {
        let mut nodes = Vec::with_capacity(records.len());
        let mut rejected = 0;
        for record in records {
            match record.into_snapshot() {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    rejected += 1;
                    tracing::warn!(error = %err, "dropping node record");
                }
            }
        }
        Self {
            nodes,
            cluster,
            rejected,
        }
    }
}

mod lenient {
    use super::*;

    /// Accept numbers, numeric strings with an optional `V` suffix, or garbage (→ `None`).
    pub fn voltage<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(number)) => number.as_f64().filter(|v| v.is_finite()),
            Some(Value::String(text)) => parse_voltage(&text),
            _ => None,
        })
    }

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(text)) => Some(text),
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(Value::Bool(flag)) => Some(flag.to_string()),
            _ => None,
        })
    }

    pub fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        string(deserializer)?.ok_or_else(|| serde::de::Error::custom("expected string or number"))
    }
}
