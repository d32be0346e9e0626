//! ---
//! gw_section: "04-networking"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "HTTP transport and operator commands."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use async_trait::async_trait;
use gridwatch_common::{Mode, PollConfig};
use gridwatch_core::{FetchError, SnapshotSet, SnapshotSource};
use tracing::warn;

use crate::transport::GridClient;

/// Polls `/status` for one controllable device.
#[derive(Debug, Clone)]
pub struct DeviceSource {
    client: GridClient,
}

impl DeviceSource {
    pub fn new(client: GridClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for DeviceSource {
    async fn fetch(&self) -> Result<SnapshotSet, FetchError> {
        let record = self.client.status().await?;
        Ok(SnapshotSet::device(record))
    }
}

/// Polls `/nodes`, and `/stats` alongside it when enabled. Stats are informational: their
/// failure never fails the poll.
#[derive(Debug, Clone)]
pub struct DashboardSource {
    client: GridClient,
    fetch_stats: bool,
}

impl DashboardSource {
    pub fn new(client: GridClient, fetch_stats: bool) -> Self {
        Self {
            client,
            fetch_stats,
        }
    }
}

#[async_trait]
impl SnapshotSource for DashboardSource {
    async fn fetch(&self) -> Result<SnapshotSet, FetchError> {
        if !self.fetch_stats {
            let records = self.client.nodes().await?;
            return Ok(SnapshotSet::dashboard(records, None));
        }

        let (records, stats) = tokio::join!(self.client.nodes(), self.client.stats());
        let records = records?;
        let cluster = match stats {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(error = %err, "cluster stats unavailable");
                None
            }
        };
        Ok(SnapshotSet::dashboard(records, cluster))
    }
}

/// Source matching the configured mode.
#[derive(Debug, Clone)]
pub enum EndpointSource {
    Device(DeviceSource),
    Dashboard(DashboardSource),
}

impl EndpointSource {
    pub fn for_mode(mode: Mode, client: GridClient, poll: &PollConfig) -> Self {
        match mode {
            Mode::Device => EndpointSource::Device(DeviceSource::new(client)),
            Mode::Dashboard => {
                EndpointSource::Dashboard(DashboardSource::new(client, poll.fetch_stats))
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for EndpointSource {
    async fn fetch(&self) -> Result<SnapshotSet, FetchError> {
        match self {
            EndpointSource::Device(source) => source.fetch().await,
            EndpointSource::Dashboard(source) => source.fetch().await,
        }
    }
}
