//! # Sync Orchestrator
//!
//! Runs sync cycles (upload, then download) one at a time and publishes the
//! outcome for the UI.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            trigger() / run_cycle()                                      │
//! │   ┌──────┐  online && guard free   ┌─────────┐                          │
//! │   │ Idle │ ──────────────────────► │ Syncing │                          │
//! │   └──────┘                         └────┬────┘                          │
//! │      ▲  ▲                               │                               │
//! │      │  │          ok: last_sync = now  │                               │
//! │      │  └───────────────────────────────┤                               │
//! │      │                                  │ err                           │
//! │      │      ┌────────────────────┐      │                               │
//! │      └───── │ Error(banner)      │ ◄────┘                               │
//! │             │ last_error kept    │                                      │
//! │             └────────────────────┘                                      │
//! │                                                                         │
//! │   offline       ──► SkippedOffline (no network call)                    │
//! │   guard taken   ──► SkippedBusy    (dropped, not queued)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Driver
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  spawn() select! loop                                                   │
//! │                                                                         │
//! │   monitor.subscribe()  offline → online edge ──┐                        │
//! │   interval tick        (only while online) ────┼──► trigger()           │
//! │   SyncTrigger::notify  (sale flow)         ────┘                        │
//! │   shutdown                                 ────► exit                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use till_db::Database;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::download::DownloadPipeline;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use crate::upload::UploadPipeline;

/// Banner shown at the register when a cycle fails.
pub const SYNC_FAILED_BANNER: &str = "Sync failed. Will retry later.";

// =============================================================================
// Sync Status
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Error(String),
}

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub cursor: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Current sync status for external queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,

    /// Last reading of the Connectivity Monitor.
    pub online: bool,

    /// Finish time of the last successful cycle.
    pub last_sync: Option<DateTime<Utc>>,

    /// Banner for the last failed cycle. Cleared by the next success.
    pub last_error: Option<String>,

    /// Transactions not yet acknowledged by the server.
    pub pending_count: i64,

    pub last_cycle: Option<CycleReport>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            state: SyncState::Idle,
            online: false,
            last_sync: None,
            last_error: None,
            pending_count: 0,
            last_cycle: None,
        }
    }
}

/// Result of a fire-and-forget trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    SkippedOffline,
    SkippedBusy,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Pushes sync events to a front end.
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &SyncStatus);

    fn emit_progress(&self, uploaded: usize, downloaded: usize);

    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for headless use and tests.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _uploaded: usize, _downloaded: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Trigger
// =============================================================================

/// Cheap handle the sale flow uses to ask for a cycle.
///
/// `notify` never waits. A full channel means a request is already queued,
/// which is as good as a second one.
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
}

impl SyncTrigger {
    pub fn channel() -> (SyncTrigger, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (SyncTrigger { tx }, rx)
    }

    /// Returns false only when the driver has stopped.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Sync driver stopped, trigger dropped");
                false
            }
        }
    }
}

// =============================================================================
// Cycle Guard
// =============================================================================

/// Holds the single-cycle claim; releases it on drop, panics included.
struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl CycleGuard {
    fn claim(running: &Arc<AtomicBool>) -> Option<CycleGuard> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                running: Arc::clone(running),
            })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sync Orchestrator
// =============================================================================

struct Inner {
    db: Database,
    tenant_id: String,
    upload: UploadPipeline,
    download: DownloadPipeline,
    monitor: Arc<ConnectivityMonitor>,
    running: Arc<AtomicBool>,
    status: watch::Sender<SyncStatus>,
    emitter: Arc<dyn SyncEventEmitter>,
}

/// Coordinates the pipelines. Clones share one guard and one status.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(
        db: Database,
        transport: Arc<dyn SyncTransport>,
        monitor: Arc<ConnectivityMonitor>,
        tenant_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self::with_emitter(
            db,
            transport,
            monitor,
            tenant_id,
            request_timeout,
            Arc::new(NoOpEmitter),
        )
    }

    pub fn with_emitter(
        db: Database,
        transport: Arc<dyn SyncTransport>,
        monitor: Arc<ConnectivityMonitor>,
        tenant_id: impl Into<String>,
        request_timeout: Duration,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let status = SyncStatus {
            online: monitor.online(),
            ..Default::default()
        };

        SyncOrchestrator {
            inner: Arc::new(Inner {
                upload: UploadPipeline::new(
                    db.clone(),
                    Arc::clone(&transport),
                    tenant_id.clone(),
                    request_timeout,
                ),
                download: DownloadPipeline::new(
                    db.clone(),
                    transport,
                    tenant_id.clone(),
                    request_timeout,
                ),
                db,
                tenant_id,
                monitor,
                running: Arc::new(AtomicBool::new(false)),
                status: watch::channel(status).0,
                emitter,
            }),
        }
    }

    pub fn from_config(
        config: &SyncConfig,
        db: Database,
        transport: Arc<dyn SyncTransport>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self::new(
            db,
            transport,
            monitor,
            config.tenant_id(),
            config.request_timeout(),
        )
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Re-reads the pending count from the Local Store.
    pub async fn refresh_pending(&self) -> SyncResult<i64> {
        let pending = self
            .inner
            .db
            .transactions()
            .count_pending(&self.inner.tenant_id)
            .await?;
        self.publish(|s| s.pending_count = pending);
        Ok(pending)
    }

    /// Starts a cycle in the background if possible. Never waits.
    pub fn trigger(&self) -> TriggerOutcome {
        let online = self.inner.monitor.online();
        self.publish(|s| s.online = online);

        if !online {
            debug!("Offline, sync skipped");
            return TriggerOutcome::SkippedOffline;
        }

        let Some(guard) = CycleGuard::claim(&self.inner.running) else {
            debug!("Cycle in flight, trigger dropped");
            return TriggerOutcome::SkippedBusy;
        };

        let this = self.clone();
        tokio::spawn(async move {
            // outcome already published as status
            let _ = this.run_claimed(guard).await;
        });
        TriggerOutcome::Started
    }

    /// Runs one cycle and waits for it.
    ///
    /// ## Errors
    /// - `ConnectivityUnavailable` when offline (nothing attempted)
    /// - `CycleInProgress` when another cycle holds the guard
    /// - the cycle's own failure otherwise, after it has been published
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let online = self.inner.monitor.online();
        self.publish(|s| s.online = online);

        if !online {
            return Err(SyncError::ConnectivityUnavailable);
        }

        let guard = CycleGuard::claim(&self.inner.running).ok_or(SyncError::CycleInProgress)?;
        self.run_claimed(guard).await
    }

    async fn run_claimed(&self, guard: CycleGuard) -> SyncResult<CycleReport> {
        self.publish(|s| s.state = SyncState::Syncing);
        info!(tenant_id = %self.inner.tenant_id, "Sync cycle started");

        let started_at = Utc::now();
        let result = self.execute(started_at).await;

        let pending = match self
            .inner
            .db
            .transactions()
            .count_pending(&self.inner.tenant_id)
            .await
        {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Could not refresh pending count");
                None
            }
        };

        match &result {
            Ok(report) => {
                info!(
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    "Sync cycle complete"
                );
                self.inner
                    .emitter
                    .emit_progress(report.uploaded, report.downloaded);

                let report = report.clone();
                self.finish(guard, move |s| {
                    s.last_sync = Some(report.finished_at);
                    s.last_error = None;
                    s.last_cycle = Some(report);
                    if let Some(n) = pending {
                        s.pending_count = n;
                    }
                });
            }
            Err(e) => {
                let banner = format!("{SYNC_FAILED_BANNER} ({e})");
                error!(error = %e, "Sync cycle failed");

                self.publish(|s| s.state = SyncState::Error(banner.clone()));
                self.inner.emitter.emit_error(&banner, e.is_retryable());

                self.finish(guard, move |s| {
                    s.last_error = Some(banner);
                    if let Some(n) = pending {
                        s.pending_count = n;
                    }
                });
            }
        }

        result
    }

    async fn execute(&self, started_at: DateTime<Utc>) -> SyncResult<CycleReport> {
        let uploaded = self.inner.upload.upload_pending().await?;
        let download = self.inner.download.sync().await?;

        Ok(CycleReport {
            uploaded,
            downloaded: download.applied,
            cursor: download.cursor,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Publishes the terminal state and releases the guard under the same
    /// lock, so anyone who observes `Idle` can start the next cycle.
    fn finish<F>(&self, guard: CycleGuard, update: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        self.inner.status.send_modify(|s| {
            update(s);
            s.state = SyncState::Idle;
            drop(guard);
        });
        self.inner.emitter.emit_status(&self.inner.status.borrow());
    }

    fn publish<F>(&self, update: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        self.inner.status.send_modify(update);
        self.inner.emitter.emit_status(&self.inner.status.borrow());
    }

    // =========================================================================
    // Background Driver
    // =========================================================================

    /// Starts the driver loop. Cycles run on connectivity edges, on the
    /// interval while online, and on `SyncTrigger` requests.
    pub fn spawn(&self, interval: Duration) -> OrchestratorHandle {
        let (trigger, trigger_rx) = SyncTrigger::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(self.clone().drive(interval, trigger_rx, shutdown_rx));

        OrchestratorHandle {
            trigger,
            shutdown_tx: Some(shutdown_tx),
            task,
            status: self.subscribe(),
        }
    }

    async fn drive(
        self,
        interval: Duration,
        mut trigger_rx: mpsc::Receiver<()>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut online_rx = self.inner.monitor.subscribe();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?interval, "Sync driver started");

        if self.inner.monitor.online() {
            self.kick("startup");
        }

        loop {
            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    self.publish(|s| s.online = online);
                    if online {
                        self.kick("reconnected");
                    }
                }

                _ = ticker.tick() => {
                    if self.inner.monitor.online() {
                        self.kick("interval");
                    }
                }

                Some(()) = trigger_rx.recv() => {
                    self.kick("sale");
                }

                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        info!("Sync driver stopped");
    }

    fn kick(&self, reason: &str) {
        let outcome = self.trigger();
        debug!(reason, ?outcome, "Sync trigger");
    }
}

// =============================================================================
// Orchestrator Handle
// =============================================================================

/// Control handle for a running driver.
pub struct OrchestratorHandle {
    trigger: SyncTrigger,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    status: watch::Receiver<SyncStatus>,
}

impl OrchestratorHandle {
    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Stops the driver. A cycle already in flight runs to completion.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Sync driver ended abnormally");
        }
    }
}
