//! ---
//! gw_section: "05-operator-interface"
//! gw_subsection: "binary"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Control CLI for watching and steering gridwatch nodes."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use anyhow::{bail, Result};
use gridwatch_client::{DashboardSource, GridClient, Operator};
use gridwatch_common::{AppConfig, Mode};
use gridwatch_core::{ClusterBadge, Reconciler, SnapshotSource};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::Commands;

/// Execute a one-shot operator command and print its JSON result.
pub(crate) async fn run(command: Commands, config: &AppConfig, client: GridClient) -> Result<()> {
    let reconciler = Reconciler::new(Mode::Dashboard, &config.watcher).into_shared();
    let operator = Operator::new(client.clone(), reconciler.clone());

    match command {
        Commands::Action { verb } => {
            let reply = operator.request_action(verb).await?;
            print_json(&json!({ "action": verb, "reply": reply }))
        }
        Commands::Verify { node_id } => {
            // Seed the tracker so a request already pending on the server is refused here.
            match DashboardSource::new(client, false).fetch().await {
                Ok(set) => {
                    reconciler.lock().apply(set);
                }
                Err(err) => warn!(error = %err, "could not read current verification state"),
            }
            let status = operator.request_verification(&node_id).await?;
            print_json(&json!({ "node_id": node_id, "verification": status }))
        }
        Commands::SetVoltage { volts } => {
            let reply = operator.set_voltage(volts).await?;
            print_json(&json!({ "volts": volts, "reply": reply }))
        }
        Commands::Configure { id, region } => {
            let reply = operator.configure(&id, &region).await?;
            print_json(&json!({ "node_id": id, "region": region, "reply": reply }))
        }
        Commands::Stats => {
            let stats = operator.client().stats().await?;
            print_json(&ClusterBadge::from(&stats))
        }
        Commands::Watch { .. } => bail!("watch is not a one-shot command"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
