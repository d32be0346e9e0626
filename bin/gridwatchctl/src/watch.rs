//! ---
//! gw_section: "05-operator-interface"
//! gw_subsection: "binary"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Control CLI for watching and steering gridwatch nodes."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::Result;
use gridwatch_client::{EndpointSource, GridClient};
use gridwatch_common::time::duration_to_millis;
use gridwatch_common::{AppConfig, Mode};
use gridwatch_core::{
    encode_text, new_registry, PollScheduler, Reconciler, ReconcilerMetrics, TriggerEvent,
};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Run the poll loop until interrupted or `cycles` views have been printed.
///
/// Views go to stdout as JSON lines. Views coalesce when the terminal is slow, so trigger
/// events are taken from their own channel and raised on stderr, one alert per event.
pub async fn run(config: &AppConfig, mode: Mode, cycles: Option<u64>) -> Result<()> {
    let registry = config.metrics.enabled.then(new_registry);
    let mut reconciler = Reconciler::new(mode, &config.watcher);
    if let Some(registry) = &registry {
        reconciler = reconciler.with_metrics(ReconcilerMetrics::new(registry.clone())?);
    }
    let reconciler = reconciler.into_shared();

    let client = GridClient::new(&config.endpoint)?;
    let source = EndpointSource::for_mode(mode, client, &config.poll);
    let period = config.poll.interval_for(mode);
    let handle = PollScheduler::new(source, reconciler, period).spawn();
    info!(mode = ?mode, period_ms = duration_to_millis(period), "watching endpoint");

    let mut views = handle.views();
    let mut events = handle.subscribe_events();
    let mut printed: u64 = 0;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("interrupt received; stopping");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("poll loop ended unexpectedly");
                    break;
                }
                let line = serde_json::to_string(&*views.borrow_and_update())?;
                println!("{line}");
                printed += 1;
                if cycles.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => raise_alert(&event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "trigger alerts dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        raise_alert(&event);
    }
    handle.stop().await?;

    if let Some(registry) = registry {
        print!("{}", encode_text(&registry)?);
        std::io::stdout().flush()?;
    }
    Ok(())
}

fn raise_alert(event: &TriggerEvent) {
    eprintln!("ALERT [{}] {}", event.node_id, event.text);
}
