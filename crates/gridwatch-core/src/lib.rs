//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Classification, verification tracking, log watching, and the poll loop that ties them
//! into a per-cycle view model.

pub mod classifier;
pub mod errors;
pub mod log_watcher;
pub mod metrics;
pub mod model;
pub mod reconciler;
pub mod scheduler;
pub mod verification;

pub use classifier::{classify, classify_snapshot, Classification, Label};
pub use errors::{FetchError, IngestError, VerificationError};
pub use log_watcher::{LogCursor, LogWatcher, TriggerEvent, TriggerPattern};
pub use metrics::{encode_text, new_registry, ReconcilerMetrics, SharedRegistry};
pub use model::{
    ClusterStats, NodeRecord, NodeSnapshot, PowerState, SnapshotSet, VerificationStatus,
};
pub use reconciler::{
    ClusterBadge, DeviceHeader, NodeView, Reconciler, SharedReconciler, SystemStatus, Totals,
    ViewModel,
};
pub use scheduler::{PollScheduler, PollState, SchedulerHandle, SchedulerStats, SnapshotSource};
pub use verification::{verify_control, VerificationTracker, VerifyAck, VerifyControl};
