//! The single-flight job controller.
//!
//! [`JobTracker`] is the only component that mutates canonical job
//! state. Each attach spawns one reconcile loop (the single writer)
//! plus one task per channel adapter and the timeout supervisor, all
//! children of a per-attach [`CancellationToken`]. Updates fan in over
//! an `mpsc` queue; observers receive snapshots over a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use lumeo_core::backend::JobBackend;
use lumeo_core::channel::{EventSocket, JobFeed};
use lumeo_core::error::CoreError;
use lumeo_core::job::{Job, JobStatus, JobType};
use lumeo_core::reconcile::{apply_update, JobState, MergeOutcome};
use lumeo_core::store::StartTimeStore;
use lumeo_core::types::JobId;
use lumeo_core::update::{JobUpdate, UpdateSource};

use crate::{feed, polling, recovery, resolver, socket, timeout};

/// Fan-in queue depth for channel updates.
const UPDATE_QUEUE_CAPACITY: usize = 64;

/// Tunable intervals for the tracker loops.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the polling adapter fetches the job row.
    pub poll_interval: Duration,
    /// How often the timeout supervisor re-checks the deadline.
    pub timeout_check_interval: Duration,
    /// Maximum age of a job the recovery scan will re-attach.
    pub recovery_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: polling::POLL_INTERVAL,
            timeout_check_interval: timeout::CHECK_INTERVAL,
            recovery_window: recovery::RECOVERY_WINDOW,
        }
    }
}

/// Bookkeeping for the currently tracked job.
struct ActiveJob {
    job_id: JobId,
    /// Cancelling this token stops the reconcile loop and every
    /// adapter task for this attach.
    cancel: CancellationToken,
    update_tx: mpsc::Sender<JobUpdate>,
    reconcile_handle: tokio::task::JoinHandle<()>,
}

/// Tracks one generation job at a time from submission (or recovery)
/// to a terminal state.
pub struct JobTracker {
    backend: Arc<dyn JobBackend>,
    feed: Arc<dyn JobFeed>,
    socket: Arc<dyn EventSocket>,
    store: Arc<dyn StartTimeStore>,
    config: TrackerConfig,
    active: Arc<Mutex<Option<ActiveJob>>>,
    snapshot_tx: Arc<watch::Sender<Option<JobState>>>,
    snapshot_rx: watch::Receiver<Option<JobState>>,
}

impl JobTracker {
    /// Create a tracker with the default intervals.
    pub fn new(
        backend: Arc<dyn JobBackend>,
        feed: Arc<dyn JobFeed>,
        socket: Arc<dyn EventSocket>,
        store: Arc<dyn StartTimeStore>,
    ) -> Self {
        Self::with_config(backend, feed, socket, store, TrackerConfig::default())
    }

    /// Create a tracker with explicit intervals.
    pub fn with_config(
        backend: Arc<dyn JobBackend>,
        feed: Arc<dyn JobFeed>,
        socket: Arc<dyn EventSocket>,
        store: Arc<dyn StartTimeStore>,
        config: TrackerConfig,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        Self {
            backend,
            feed,
            socket,
            store,
            config,
            active: Arc::new(Mutex::new(None)),
            snapshot_tx: Arc::new(snapshot_tx),
            snapshot_rx,
        }
    }

    /// Subscribe to canonical state snapshots.
    ///
    /// The receiver holds `None` until a job is attached and keeps the
    /// final terminal snapshot after detach.
    pub fn subscribe(&self) -> watch::Receiver<Option<JobState>> {
        self.snapshot_rx.clone()
    }

    /// The latest canonical snapshot, if any job has been tracked.
    pub fn current(&self) -> Option<JobState> {
        self.snapshot_rx.borrow().clone()
    }

    /// The id of the currently tracked job, if one is in flight.
    pub async fn tracked_job_id(&self) -> Option<JobId> {
        self.active.lock().await.as_ref().map(|a| a.job_id)
    }

    /// Submit a new job and start tracking it.
    ///
    /// Fails with [`CoreError::AlreadyTracking`] while a job is in
    /// flight (the controller is single-flight), and with
    /// [`CoreError::Submission`] when the backend rejects the request
    /// before assigning an id -- in that case no tracking begins.
    pub async fn submit(
        &self,
        job_type: JobType,
        parameters: &serde_json::Value,
    ) -> Result<JobId, CoreError> {
        if let Some(ref active) = *self.active.lock().await {
            return Err(CoreError::AlreadyTracking(active.job_id));
        }

        let submitted = self.backend.create_job(job_type, parameters).await?;
        let job_id = submitted.job.id;
        tracing::info!(job_id, ?job_type, "Job submitted");

        self.attach(submitted.job).await?;
        Ok(job_id)
    }

    /// Scan for a still-active job from a previous run and re-attach.
    ///
    /// Runs once per tracker start, before any job is known locally.
    /// Both "nothing found" and a failed recovery query leave the
    /// tracker idle.
    pub async fn recover(&self) -> Option<JobId> {
        if self.active.lock().await.is_some() {
            return None;
        }

        let job = recovery::scan(self.backend.as_ref(), self.config.recovery_window).await?;
        let job_id = job.id;

        match self.attach(job).await {
            Ok(()) => {
                tracing::info!(job_id, "Re-attached to in-flight job");
                Some(job_id)
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Failed to attach recovered job");
                None
            }
        }
    }

    /// Cancel the tracked job.
    ///
    /// Locks local state to `Cancelled` immediately -- any update that
    /// arrives afterward is discarded -- then issues the delete to the
    /// backend. A backend failure is returned but does not unlock the
    /// local state. No-op when nothing is tracked.
    pub async fn cancel(&self) -> Result<(), CoreError> {
        let (job_id, update_tx) = {
            let active = self.active.lock().await;
            match *active {
                Some(ref a) => (a.job_id, a.update_tx.clone()),
                None => return Ok(()),
            }
        };

        tracing::info!(job_id, "Cancelling tracked job");
        let _ = update_tx
            .send(JobUpdate::status_only(
                job_id,
                JobStatus::Cancelled,
                UpdateSource::Cancel,
            ))
            .await;

        self.backend.cancel_job(job_id).await
    }

    /// Stop tracking without touching the job or the durable record.
    ///
    /// The start-time record is kept on purpose so the next start can
    /// recover the job with its original timeout budget.
    pub async fn shutdown(&self) {
        let taken = self.active.lock().await.take();
        if let Some(active) = taken {
            tracing::info!(job_id = active.job_id, "Tracker shutting down");
            active.cancel.cancel();
            let _ = tokio::time::timeout(Duration::from_secs(5), active.reconcile_handle).await;
        }
    }

    // ---- private helpers ----

    /// Register a job: durable start time, adapters, supervisor, and
    /// the reconcile loop.
    async fn attach(&self, job: Job) -> Result<(), CoreError> {
        let mut active = self.active.lock().await;
        if let Some(ref existing) = *active {
            return Err(CoreError::AlreadyTracking(existing.job_id));
        }

        let job_id = job.id;
        let job_type = job.job_type;

        // The durable record wins over the row: a re-attach must keep
        // the original submission time, or a reload would grant the
        // job extra runtime.
        let started_at = match self.store.get(job_id).await {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                let ts = job.created_at;
                if let Err(e) = self.store.put(job_id, ts).await {
                    tracing::warn!(job_id, error = %e, "Failed to persist start time");
                }
                ts
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Failed to read start time; using created_at");
                job.created_at
            }
        };

        let cancel = CancellationToken::new();
        let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);

        tokio::spawn(polling::run(
            Arc::clone(&self.backend),
            job_id,
            self.config.poll_interval,
            update_tx.clone(),
            cancel.child_token(),
        ));
        tokio::spawn(feed::run(
            Arc::clone(&self.feed),
            job_id,
            update_tx.clone(),
            cancel.child_token(),
        ));
        tokio::spawn(socket::run(
            self.socket.subscribe(),
            job_id,
            update_tx.clone(),
            cancel.child_token(),
        ));
        tokio::spawn(timeout::run(
            job_id,
            job_type,
            started_at,
            self.config.timeout_check_interval,
            update_tx.clone(),
            cancel.child_token(),
        ));

        let state = JobState::new(job);
        self.snapshot_tx.send_replace(Some(state.clone()));

        let reconcile_handle = tokio::spawn(reconcile_loop(
            state,
            update_rx,
            Arc::clone(&self.snapshot_tx),
            Arc::clone(&self.backend),
            Arc::clone(&self.store),
            Arc::clone(&self.active),
            cancel.clone(),
        ));

        *active = Some(ActiveJob {
            job_id,
            cancel,
            update_tx,
            reconcile_handle,
        });

        tracing::info!(job_id, ?job_type, started_at = %started_at, "Job attached");
        Ok(())
    }
}

/// The single writer: folds fan-in updates into canonical state until
/// a terminal status locks it, then detaches.
async fn reconcile_loop(
    mut state: JobState,
    mut update_rx: mpsc::Receiver<JobUpdate>,
    snapshot_tx: Arc<watch::Sender<Option<JobState>>>,
    backend: Arc<dyn JobBackend>,
    store: Arc<dyn StartTimeStore>,
    active: Arc<Mutex<Option<ActiveJob>>>,
    cancel: CancellationToken,
) {
    let job_id = state.job.id;

    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => return,
            update = update_rx.recv() => match update {
                Some(update) => update,
                None => return,
            },
        };

        if update.job_id != job_id {
            tracing::debug!(job_id, other = update.job_id, "Dropping update for untracked job");
            continue;
        }

        match apply_update(&mut state, &update) {
            MergeOutcome::Applied { terminal: true } => {
                tracing::info!(
                    job_id,
                    status = ?state.job.status,
                    source = ?update.source,
                    "Job reached terminal state",
                );
                if state.job.status == JobStatus::Completed {
                    resolver::resolve(backend.as_ref(), &mut state.job).await;
                }
                // Tear down before publishing so an observer of the
                // terminal snapshot sees the slot already free.
                detach(job_id, &cancel, store.as_ref(), &active).await;
                snapshot_tx.send_replace(Some(state.clone()));
                return;
            }
            MergeOutcome::Applied { terminal: false } => {
                snapshot_tx.send_replace(Some(state.clone()));
            }
            MergeOutcome::Unchanged | MergeOutcome::Discarded => {}
            MergeOutcome::TerminalConflict { incoming } => {
                tracing::warn!(
                    job_id,
                    locked = ?state.job.status,
                    incoming = ?incoming,
                    source = ?update.source,
                    "Conflicting terminal update discarded",
                );
            }
        }
    }
}

/// Tear down one attach: stop the adapters, drop the durable record,
/// free the single-flight slot.
async fn detach(
    job_id: JobId,
    cancel: &CancellationToken,
    store: &dyn StartTimeStore,
    active: &Mutex<Option<ActiveJob>>,
) {
    cancel.cancel();

    if let Err(e) = store.remove(job_id).await {
        tracing::warn!(job_id, error = %e, "Failed to remove start-time record");
    }

    let mut slot = active.lock().await;
    if slot.as_ref().map(|a| a.job_id) == Some(job_id) {
        *slot = None;
    }

    tracing::info!(job_id, "Job detached");
}
