//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Merges each poll result into the state the presentation layer reads.
//!
//! All per-node state (log cursors, verification cache, last view) is owned here and
//! mutated only through [`Reconciler::apply`], [`Reconciler::degrade`] and the verification
//! entry points.

use std::collections::HashSet;
use std::sync::Arc;

use gridwatch_common::time::display_last_seen;
use gridwatch_common::{CursorScope, Mode, WatcherConfig};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{classify_snapshot, Classification, Label};
use crate::errors::VerificationError;
use crate::log_watcher::{LogWatcher, TriggerEvent, TriggerPattern};
use crate::metrics::ReconcilerMetrics;
use crate::model::{ClusterStats, NodeSnapshot, PowerState, SnapshotSet, VerificationStatus};
use crate::verification::{verify_control, VerificationTracker, VerifyAck, VerifyControl};

/// Reconciler shared between the poll loop and operator commands.
pub type SharedReconciler = Arc<Mutex<Reconciler>>;

/// Overall reachability of the endpoint as of the last poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SystemStatus {
    /// No poll has completed yet.
    Starting,
    Online,
    Offline { reason: String },
}

impl SystemStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, SystemStatus::Online)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    pub region: String,
    pub voltage: f64,
    pub power: PowerState,
    pub connected: bool,
    pub last_seen: Option<String>,
    pub classification: Classification,
    pub verification: VerificationStatus,
    pub verify_control: VerifyControl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub outage: usize,
}

impl Totals {
    fn tally<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a NodeView>,
    {
        nodes.into_iter().fold(Totals::default(), |mut totals, node| {
            totals.total += 1;
            if node.connected {
                totals.online += 1;
            } else {
                totals.offline += 1;
            }
            if node.classification.label == Label::Outage {
                totals.outage += 1;
            }
            totals
        })
    }
}

/// Leader/follower badge derived from `/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBadge {
    pub server_id: String,
    pub is_leader: bool,
    pub label: String,
}

impl From<&ClusterStats> for ClusterBadge {
    fn from(stats: &ClusterStats) -> Self {
        Self {
            server_id: stats.server_id.clone(),
            is_leader: stats.is_leader,
            label: stats.badge().to_owned(),
        }
    }
}

/// Header of the single-device view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHeader {
    pub node_id: String,
    pub region: String,
    pub connected: bool,
    pub connect_enabled: bool,
    pub disconnect_enabled: bool,
    /// The device still reports the unknown-region sentinel and awaits `configure`.
    pub needs_setup: bool,
}

impl From<&NodeSnapshot> for DeviceHeader {
    fn from(node: &NodeSnapshot) -> Self {
        Self {
            node_id: node.id.clone(),
            region: node.region.clone(),
            connected: node.connected,
            connect_enabled: !node.connected,
            disconnect_enabled: node.connected,
            needs_setup: node.is_unconfigured(),
        }
    }
}

/// Read-only result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub cycle: u64,
    pub mode: Mode,
    pub system: SystemStatus,
    pub nodes: Vec<NodeView>,
    pub totals: Totals,
    /// Records the last successful poll dropped because they carried no id.
    pub rejected: usize,
    /// Trigger events first observed in this cycle.
    pub events: Vec<TriggerEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterBadge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceHeader>,
}

impl ViewModel {
    pub fn node(&self, id: &str) -> Option<&NodeView> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

#[derive(Debug)]
pub struct Reconciler {
    mode: Mode,
    watcher: LogWatcher,
    verification: VerificationTracker,
    nodes: IndexMap<String, NodeView>,
    cycle: u64,
    system: SystemStatus,
    cluster: Option<ClusterBadge>,
    device: Option<DeviceHeader>,
    rejected: usize,
    metrics: Option<ReconcilerMetrics>,
}

impl Reconciler {
    /// A device exposes one log stream whatever identity it currently carries, so device
    /// mode always keys its cursor globally.
    pub fn new(mode: Mode, watcher: &WatcherConfig) -> Self {
        let scope = match mode {
            Mode::Device => CursorScope::Global,
            Mode::Dashboard => watcher.scope,
        };
        Self::with_watcher(
            mode,
            LogWatcher::new(TriggerPattern::new(&watcher.trigger_phrases), scope),
        )
    }

    pub fn with_watcher(mode: Mode, watcher: LogWatcher) -> Self {
        Self {
            mode,
            watcher,
            verification: VerificationTracker::new(),
            nodes: IndexMap::new(),
            cycle: 0,
            system: SystemStatus::Starting,
            cluster: None,
            device: None,
            rejected: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ReconcilerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn into_shared(self) -> SharedReconciler {
        Arc::new(Mutex::new(self))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn metrics(&self) -> Option<&ReconcilerMetrics> {
        self.metrics.as_ref()
    }

    pub fn watcher(&self) -> &LogWatcher {
        &self.watcher
    }

    pub fn verification(&self) -> &VerificationTracker {
        &self.verification
    }

    /// Merge a successful poll and return the resulting view.
    pub fn apply(&mut self, set: SnapshotSet) -> ViewModel {
        self.cycle += 1;
        if !self.system.is_online() {
            info!(cycle = self.cycle, "endpoint reachable");
        }
        self.system = SystemStatus::Online;

        if let Some(stats) = &set.cluster {
            self.cluster = Some(ClusterBadge::from(stats));
        }

        self.rejected = set.rejected;

        let present: HashSet<&str> = set.nodes.iter().map(|node| node.id.as_str()).collect();
        for id in self.nodes.keys().filter(|id| !present.contains(id.as_str())) {
            debug!(node_id = %id, "node absent from snapshot; forgetting");
            self.watcher.forget(id);
        }
        self.verification.retain(|id| present.contains(id));

        self.device = match self.mode {
            Mode::Device => set.nodes.first().map(DeviceHeader::from),
            Mode::Dashboard => None,
        };

        let events = self.watcher.scan_poll(
            set.nodes
                .iter()
                .map(|node| (node.id.as_str(), node.logs.as_slice())),
        );

        let mut nodes = IndexMap::with_capacity(set.nodes.len());
        for node in set.nodes {
            if let Some(reported) = node.verification {
                self.verification.observe(&node.id, reported);
            }
            let view = self.node_view(&node);
            nodes.insert(node.id, view);
        }
        self.nodes = nodes;

        if let Some(metrics) = &self.metrics {
            metrics.add_triggers(events.len());
            metrics.set_node_labels(self.nodes.values().map(|node| node.classification.label));
        }

        self.snapshot(events)
    }

    /// Record a failed poll. Per-node state is left exactly as it was.
    pub fn degrade(&mut self, reason: impl Into<String>) -> ViewModel {
        let reason = reason.into();
        self.cycle += 1;
        if self.system.is_online() {
            warn!(cycle = self.cycle, reason = %reason, "endpoint unreachable; showing last known state");
        }
        self.system = SystemStatus::Offline { reason };
        self.snapshot(Vec::new())
    }

    /// Current view without new events.
    pub fn view(&self) -> ViewModel {
        self.snapshot(Vec::new())
    }

    /// Check whether a verification request may be sent for `node_id`.
    pub fn begin_verification(&self, node_id: &str) -> Result<(), VerificationError> {
        self.verification.begin_request(node_id)
    }

    /// Apply the server's answer to a verification request and refresh the node's view.
    pub fn apply_verify_ack(
        &mut self,
        node_id: &str,
        ack: VerifyAck,
    ) -> Result<VerificationStatus, VerificationError> {
        let status = self.verification.apply_ack(node_id, ack)?;
        if let Some(view) = self.nodes.get_mut(node_id) {
            view.verification = status;
            view.verify_control =
                verify_control(view.classification, view.power, view.connected, status);
        }
        Ok(status)
    }

    fn node_view(&self, node: &NodeSnapshot) -> NodeView {
        let classification = classify_snapshot(node);
        let verification = self.verification.status(&node.id);
        NodeView {
            id: node.id.clone(),
            region: node.region.clone(),
            voltage: node.voltage,
            power: node.power,
            connected: node.connected,
            last_seen: node.last_seen.as_deref().map(display_last_seen),
            classification,
            verification,
            verify_control: verify_control(classification, node.power, node.connected, verification),
        }
    }

    fn snapshot(&self, events: Vec<TriggerEvent>) -> ViewModel {
        ViewModel {
            cycle: self.cycle,
            mode: self.mode,
            system: self.system.clone(),
            nodes: self.nodes.values().cloned().collect(),
            totals: Totals::tally(self.nodes.values()),
            rejected: self.rejected,
            events,
            cluster: self.cluster.clone(),
            device: self.device.clone(),
        }
    }
}
