//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Imperative entry points layered on top of the poll loop.
//!
//! Commands are single requests with no automatic retry; a failure is returned to the
//! caller. The reconciler lock is only taken around synchronous state changes, never
//! across a request.

use gridwatch_core::{SharedReconciler, VerificationStatus, VerifyAck};
use tracing::info;

use crate::command::{ActionVerb, CommandReply};
use crate::error::ClientError;
use crate::transport::GridClient;

/// Status the configure endpoint returns once the identity is stored.
pub const CONFIGURED_STATUS: &str = "configured";

#[derive(Debug, Clone)]
pub struct Operator {
    client: GridClient,
    reconciler: SharedReconciler,
}

impl Operator {
    pub fn new(client: GridClient, reconciler: SharedReconciler) -> Self {
        Self { client, reconciler }
    }

    pub fn client(&self) -> &GridClient {
        &self.client
    }

    pub async fn request_action(&self, verb: ActionVerb) -> Result<CommandReply, ClientError> {
        let reply = self.client.action(verb).await?;
        info!(action = %verb, status = ?reply.status, "action accepted");
        Ok(reply)
    }

    /// Ask the server to verify a node. Refused locally while a request is pending.
    pub async fn request_verification(
        &self,
        node_id: &str,
    ) -> Result<VerificationStatus, ClientError> {
        self.reconciler.lock().begin_verification(node_id)?;

        let ack = match self.client.verify(node_id).await {
            Ok(reply) => VerifyAck::from_reply(reply.status.as_deref(), reply.error.as_deref()),
            Err(ClientError::Rejected { message, .. }) => VerifyAck::Rejected { reason: message },
            Err(err) => return Err(err),
        };
        let status = self.reconciler.lock().apply_verify_ack(node_id, ack)?;
        Ok(status)
    }

    /// Override the simulated voltage. Non-finite values never leave the client.
    pub async fn set_voltage(&self, volts: f64) -> Result<CommandReply, ClientError> {
        if !volts.is_finite() {
            return Err(ClientError::InvalidInput(format!(
                "voltage must be a finite number, got {volts}"
            )));
        }
        let reply = self.client.set_voltage(volts).await?;
        info!(volts, "voltage override sent");
        Ok(reply)
    }

    /// Assign the device identity, then connect once the server confirms it.
    pub async fn configure(&self, id: &str, region: &str) -> Result<CommandReply, ClientError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ClientError::InvalidInput("device id must not be blank".into()));
        }
        let reply = self.client.configure(id, region.trim()).await?;
        if reply.status_is(CONFIGURED_STATUS) {
            info!(node_id = id, region, "device configured; connecting");
            self.request_action(ActionVerb::Connect).await?;
        }
        Ok(reply)
    }
}
