//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use thiserror::Error;

/// A raw record that cannot be turned into a node snapshot at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("node record is missing an identifier")]
    MissingId,
}

/// Refusals from the verification workflow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("verification for node {node_id} is already pending")]
    AlreadyPending { node_id: String },
    #[error("verification for node {node_id} rejected: {reason}")]
    Rejected { node_id: String, reason: String },
}

/// Why a poll produced no snapshot. Every variant is recoverable on the next tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("endpoint answered with status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
}
