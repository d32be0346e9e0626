//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Verbs accepted by the device `/action` endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionVerb {
    Connect,
    Disconnect,
    Reconnect,
    OutageStart,
    OutageEnd,
    LowVoltage,
}

/// `{status, error}` body returned by every command endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    pub fn status_is(&self, expected: &str) -> bool {
        self.status.as_deref() == Some(expected)
    }

    /// Server-side error message, if the payload carries a non-blank one.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|message| !message.trim().is_empty())
    }
}
