//! ---
//! gw_section: "02-reconciliation-engine"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Reconciliation engine for node telemetry snapshots."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Fixed-period poll loop.
//!
//! Each tick starts at most one fetch. A tick that finds a fetch in flight is skipped, so
//! a slow endpoint never accumulates concurrent requests. Fetch results come back to the
//! loop through a channel and are applied to the [`Reconciler`] from the loop alone; once a
//! stop has been signalled no further result is applied.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gridwatch_common::time::duration_to_millis;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::log_watcher::TriggerEvent;
use crate::model::SnapshotSet;
use crate::reconciler::{SharedReconciler, ViewModel};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Anything that can produce one snapshot set per call.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<SnapshotSet, FetchError>;
}

#[async_trait]
impl<T> SnapshotSource for Arc<T>
where
    T: SnapshotSource + ?Sized,
{
    async fn fetch(&self) -> Result<SnapshotSet, FetchError> {
        (**self).fetch().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
}

/// Interval that delays rather than bursts after a missed tick.
struct RateLimiter {
    interval: Interval,
}

impl RateLimiter {
    fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Loop counters, readable while the scheduler runs.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    skipped: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failures: AtomicU64,
    fetching: AtomicBool,
}

impl SchedulerStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Fetches whose result was applied, successful or not.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> PollState {
        if self.fetching.load(Ordering::Acquire) {
            PollState::Fetching
        } else {
            PollState::Idle
        }
    }
}

pub struct PollScheduler<S> {
    source: Arc<S>,
    reconciler: SharedReconciler,
    period: Duration,
}

impl<S> PollScheduler<S>
where
    S: SnapshotSource,
{
    pub fn new(source: S, reconciler: SharedReconciler, period: Duration) -> Self {
        Self {
            source: Arc::new(source),
            reconciler,
            period,
        }
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (view_tx, view_rx) = watch::channel(self.reconciler.lock().view());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stats = Arc::new(SchedulerStats::default());

        let task = tokio::spawn(run_loop(
            self.source,
            self.reconciler,
            self.period,
            LoopChannels {
                shutdown: shutdown_rx,
                views: view_tx,
                events: event_tx.clone(),
            },
            stats.clone(),
        ));

        SchedulerHandle {
            shutdown: shutdown_tx,
            views: view_rx,
            events: event_tx,
            stats,
            task,
        }
    }
}

struct LoopChannels {
    shutdown: watch::Receiver<bool>,
    views: watch::Sender<ViewModel>,
    events: broadcast::Sender<TriggerEvent>,
}

type FetchOutcome = (Result<SnapshotSet, FetchError>, Duration);

async fn run_loop<S>(
    source: Arc<S>,
    reconciler: SharedReconciler,
    period: Duration,
    mut channels: LoopChannels,
    stats: Arc<SchedulerStats>,
) where
    S: SnapshotSource,
{
    let mut limiter = RateLimiter::new(period);
    let (result_tx, mut result_rx) = mpsc::channel::<FetchOutcome>(1);
    let mut in_flight: Option<JoinHandle<()>> = None;
    info!(period_ms = duration_to_millis(period), "poll scheduler started");

    loop {
        tokio::select! {
            biased;
            _ = channels.shutdown.changed() => {
                debug!("poll scheduler shutdown signal received");
                break;
            }
            Some((result, elapsed)) = result_rx.recv() => {
                in_flight = None;
                stats.fetching.store(false, Ordering::Release);
                if *channels.shutdown.borrow() {
                    break;
                }
                let view = {
                    let mut reconciler = reconciler.lock();
                    if let Some(metrics) = reconciler.metrics() {
                        metrics.record_poll(result.is_ok(), elapsed.as_secs_f64());
                    }
                    match result {
                        Ok(set) => reconciler.apply(set),
                        Err(err) => {
                            stats.failures.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %err, "poll failed");
                            reconciler.degrade(err.to_string())
                        }
                    }
                };
                stats.completed.fetch_add(1, Ordering::Relaxed);
                for event in &view.events {
                    let _ = channels.events.send(event.clone());
                }
                let _ = channels.views.send(view);
            }
            _ = limiter.tick() => {
                stats.ticks.fetch_add(1, Ordering::Relaxed);
                if in_flight.is_some() {
                    stats.skipped.fetch_add(1, Ordering::Relaxed);
                    if let Some(metrics) = reconciler.lock().metrics() {
                        metrics.inc_skipped();
                    }
                    debug!("poll still in flight; skipping tick");
                    continue;
                }
                stats.started.fetch_add(1, Ordering::Relaxed);
                stats.fetching.store(true, Ordering::Release);
                let source = source.clone();
                let tx = result_tx.clone();
                in_flight = Some(tokio::spawn(async move {
                    let started = Instant::now();
                    let result = source.fetch().await;
                    let _ = tx.send((result, started.elapsed())).await;
                }));
            }
        }
    }

    if let Some(handle) = in_flight.take() {
        handle.abort();
    }
    stats.fetching.store(false, Ordering::Release);
    info!("poll scheduler stopped");
}

/// Running scheduler. Dropping the handle without [`SchedulerHandle::stop`] also ends the
/// loop, since the shutdown channel closes.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    views: watch::Receiver<ViewModel>,
    events: broadcast::Sender<TriggerEvent>,
    stats: Arc<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Latest published view; `changed()` wakes on every applied poll.
    pub fn views(&self) -> watch::Receiver<ViewModel> {
        self.views.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TriggerEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    /// Stop ticking, abandon any in-flight fetch and wait for the loop to exit.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|err| anyhow!("poll scheduler task failed: {err}"))
    }
}
