//! ---
//! gw_section: "03-observability"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Prometheus instruments for the polling loop."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::classifier::Label;

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Render every family in the registry in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("failed to encode metrics")
}

/// Outcome label values for `gridwatch_polls_total`.
pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_ERROR: &str = "error";

const LABELS: [Label; 5] = [
    Label::Normal,
    Label::Low,
    Label::VeryLow,
    Label::Outage,
    Label::Offline,
];

#[derive(Clone, Debug)]
pub struct ReconcilerMetrics {
    registry: SharedRegistry,
    polls: IntCounterVec,
    ticks_skipped: IntCounter,
    trigger_events: IntCounter,
    nodes: IntGaugeVec,
    poll_duration: Histogram,
}

impl ReconcilerMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let polls = IntCounterVec::new(
            Opts::new("gridwatch_polls_total", "Completed polls by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(polls.clone()))?;

        let ticks_skipped = IntCounter::with_opts(Opts::new(
            "gridwatch_ticks_skipped_total",
            "Ticks skipped because a poll was still in flight",
        ))?;
        registry.register(Box::new(ticks_skipped.clone()))?;

        let trigger_events = IntCounter::with_opts(Opts::new(
            "gridwatch_trigger_events_total",
            "Inquiry triggers observed in node logs",
        ))?;
        registry.register(Box::new(trigger_events.clone()))?;

        let nodes = IntGaugeVec::new(
            Opts::new("gridwatch_nodes", "Nodes in the last snapshot by label"),
            &["label"],
        )?;
        registry.register(Box::new(nodes.clone()))?;

        let buckets = prometheus::exponential_buckets(0.005, 2.0, 12)
            .context("failed to construct histogram buckets")?;
        let poll_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gridwatch_poll_duration_seconds",
                "Wall time of one snapshot fetch",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(poll_duration.clone()))?;

        Ok(Self {
            registry,
            polls,
            ticks_skipped,
            trigger_events,
            nodes,
            poll_duration,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_poll(&self, ok: bool, seconds: f64) {
        let outcome = if ok { OUTCOME_OK } else { OUTCOME_ERROR };
        self.polls.with_label_values(&[outcome]).inc();
        self.poll_duration.observe(seconds);
    }

    pub fn inc_skipped(&self) {
        self.ticks_skipped.inc();
    }

    pub fn add_triggers(&self, count: usize) {
        self.trigger_events.inc_by(count as u64);
    }

    /// Replace the per-label node gauges with the counts of the latest snapshot.
    pub fn set_node_labels<I>(&self, labels: I)
    where
        I: IntoIterator<Item = Label>,
    {
        let mut counts = [0i64; LABELS.len()];
        for label in labels {
            if let Some(slot) = LABELS.iter().position(|l| *l == label) {
                counts[slot] += 1;
            }
        }
        for (label, count) in LABELS.iter().zip(counts) {
            self.nodes.with_label_values(&[label.as_ref()]).set(count);
        }
    }
}
