//! Periodic re-synchronization
//!
//! Passes never overlap. Each pass runs on tokio's blocking pool and is awaited
//! before the next tick is considered, and a shutdown request is only observed
//! between passes.

use crate::engine::{SyncEngine, SyncRequest};
use mirrorsync_types::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Counters for a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    /// Passes started
    pub passes: u64,
    /// Passes that aborted before touching the replica
    pub aborted: u64,
    /// Per-file failures across all completed passes
    pub failures: u64,
}

/// Requests a running [`PeriodicSync`] to stop after its current pass
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: mpsc::Sender<()>,
}

impl ShutdownHandle {
    /// Ask the scheduler to stop; repeated calls are harmless
    pub fn shutdown(&self) {
        if self.sender.try_send(()).is_err() {
            debug!("Shutdown already requested");
        }
    }
}

/// Runs a [`SyncEngine`] on a fixed interval until shut down
pub struct PeriodicSync {
    engine: Arc<SyncEngine>,
    request: SyncRequest,
    interval: Duration,
    max_passes: Option<u64>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl PeriodicSync {
    /// Create a scheduler; `interval` must be non-zero
    pub fn new(engine: Arc<SyncEngine>, request: SyncRequest, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::config("Sync interval must be greater than zero"));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Ok(Self {
            engine,
            request,
            interval,
            max_passes: None,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Stop on its own after `passes` passes
    pub fn with_max_passes(mut self, passes: u64) -> Self {
        self.max_passes = Some(passes);
        self
    }

    /// The configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A handle that stops this scheduler
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.shutdown_tx.clone(),
        }
    }

    /// Run passes until shut down or `max_passes` is reached
    ///
    /// The first pass starts immediately. An aborted pass is counted and the
    /// schedule goes on: the source may well be back by the next tick.
    pub async fn run(mut self) -> Result<SchedulerSummary> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = SchedulerSummary::default();
        info!("Syncing every {:?}", self.interval);

        loop {
            if self.max_passes.is_some_and(|max| summary.passes >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested, stopping after {} passes", summary.passes);
                    break;
                }
                _ = ticker.tick() => {}
            }

            let engine = Arc::clone(&self.engine);
            let request = self.request.clone();
            let outcome = tokio::task::spawn_blocking(move || engine.synchronize(&request))
                .await
                .map_err(|e| Error::other(format!("Sync pass panicked: {}", e)))?;

            summary.passes += 1;
            match outcome {
                Ok(report) => summary.failures += report.failures.len() as u64,
                Err(e) => {
                    warn!("Pass {} aborted: {}", summary.passes, e);
                    summary.aborted += 1;
                }
            }
        }

        Ok(summary)
    }
}
