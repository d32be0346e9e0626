//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Per-node verification workflow cache.
//!
//! The server owns the authoritative state; this tracker mirrors it, blocks duplicate
//! requests while one is pending, and records the optimistic `PENDING` after the server
//! accepts a request. There is no client-side expiry: a pending request stays pending until
//! a snapshot says otherwise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::{Classification, Label};
use crate::errors::VerificationError;
use crate::model::{PowerState, VerificationStatus};

/// Server statuses that mean a verification request was accepted.
pub const ACCEPTED_STATUSES: &[&str] = &["sent", "queued", "queued_web"];

/// Server answer to a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyAck {
    Accepted { status: String },
    Rejected { reason: String },
}

impl VerifyAck {
    /// Interpret a `{status, error}` reply from the verify endpoint.
    pub fn from_reply(status: Option<&str>, error: Option<&str>) -> Self {
        if let Some(reason) = error.filter(|e| !e.trim().is_empty()) {
            return VerifyAck::Rejected {
                reason: reason.to_owned(),
            };
        }
        match status.map(str::trim) {
            Some(status) if ACCEPTED_STATUSES.contains(&status) => VerifyAck::Accepted {
                status: status.to_owned(),
            },
            Some(other) => VerifyAck::Rejected {
                reason: format!("unexpected status '{other}'"),
            },
            None => VerifyAck::Rejected {
                reason: "Failed to send request".to_owned(),
            },
        }
    }
}

/// What the presentation layer may offer for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyControl {
    /// Node is healthy or already confirmed.
    Hidden,
    /// A request is outstanding; the control is shown disabled.
    Waiting,
    /// Node is anomalous and a request can be sent.
    Available,
}

/// Decide which verification control a node gets.
pub fn verify_control(
    classification: Classification,
    power: PowerState,
    connected: bool,
    status: VerificationStatus,
) -> VerifyControl {
    let anomalous =
        power != PowerState::Normal || classification.label != Label::Normal || !connected;
    match status {
        _ if !anomalous => VerifyControl::Hidden,
        VerificationStatus::Confirmed => VerifyControl::Hidden,
        VerificationStatus::Pending => VerifyControl::Waiting,
        VerificationStatus::None => VerifyControl::Available,
    }
}

fn expected_transition(from: VerificationStatus, to: VerificationStatus) -> bool {
    use VerificationStatus::*;
    matches!(
        (from, to),
        (None, None)
            | (Pending, Pending)
            | (Confirmed, Confirmed)
            | (None, Pending)
            | (Confirmed, Pending)
            | (Pending, Confirmed)
            | (Pending, None)
    )
}

#[derive(Debug, Default)]
pub struct VerificationTracker {
    states: HashMap<String, VerificationStatus>,
}

impl VerificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, node_id: &str) -> VerificationStatus {
        self.states.get(node_id).copied().unwrap_or_default()
    }

    /// Check that a new request may be issued. Requests are refused while one is pending.
    pub fn begin_request(&self, node_id: &str) -> Result<(), VerificationError> {
        match self.status(node_id) {
            VerificationStatus::Pending => Err(VerificationError::AlreadyPending {
                node_id: node_id.to_owned(),
            }),
            VerificationStatus::None | VerificationStatus::Confirmed => Ok(()),
        }
    }

    /// Record the server's answer to a request. Acceptance moves the node to `PENDING`;
    /// a rejection leaves the state untouched and is returned to the caller.
    pub fn apply_ack(
        &mut self,
        node_id: &str,
        ack: VerifyAck,
    ) -> Result<VerificationStatus, VerificationError> {
        match ack {
            VerifyAck::Accepted { status } => {
                let previous = self
                    .states
                    .insert(node_id.to_owned(), VerificationStatus::Pending)
                    .unwrap_or_default();
                info!(node_id, server_status = %status, from = %previous, "verification pending");
                Ok(VerificationStatus::Pending)
            }
            VerifyAck::Rejected { reason } => {
                warn!(node_id, reason = %reason, "verification request rejected");
                Err(VerificationError::Rejected {
                    node_id: node_id.to_owned(),
                    reason,
                })
            }
        }
    }

    /// Mirror a server-reported status. The server always wins.
    pub fn observe(&mut self, node_id: &str, reported: VerificationStatus) {
        let previous = self.status(node_id);
        if previous == reported {
            self.states.entry(node_id.to_owned()).or_insert(reported);
            return;
        }
        if expected_transition(previous, reported) {
            info!(node_id, from = %previous, to = %reported, "verification status changed");
        } else {
            warn!(node_id, from = %previous, to = %reported, "server reported unexpected verification transition");
        }
        self.states.insert(node_id.to_owned(), reported);
    }

    /// Drop entries for nodes that no longer exist.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.states.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
