//! Shared fakes and fixtures for the tracker integration tests.
//!
//! The engine only sees the `lumeo-core` trait seams, so everything
//! here is in-memory: a backend with scriptable rows, a feed the test
//! pushes rows into, and a socket the test sends events on.

// Each integration test binary compiles its own copy and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use lumeo_core::backend::{JobBackend, SubmittedJob};
use lumeo_core::channel::{EventSocket, JobFeed};
use lumeo_core::error::CoreError;
use lumeo_core::job::{Job, JobStatus, JobType};
use lumeo_core::reconcile::JobState;
use lumeo_core::types::{JobId, Timestamp};
use lumeo_core::update::JobEvent;
use lumeo_tracker::{JobTracker, MemoryStartTimeStore, TrackerConfig};

/// Build a job row for scripting fakes.
pub fn job_row(
    id: JobId,
    job_type: JobType,
    status: JobStatus,
    progress: i16,
    created_at: Timestamp,
) -> Job {
    Job {
        id,
        job_type,
        status,
        progress,
        current_stage: None,
        outputs: None,
        error_message: None,
        created_at,
    }
}

/// Scriptable in-memory backend.
#[derive(Default)]
pub struct FakeBackend {
    next_id: AtomicI64,
    pub rows: Mutex<HashMap<JobId, Job>>,
    pub recovery_answer: Mutex<Option<Job>>,
    pub fail_recovery: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fallback_outputs: Mutex<HashMap<JobId, Vec<String>>>,
    pub cancelled: Mutex<Vec<JobId>>,
}

impl FakeBackend {
    /// Replace the row that polling will see.
    pub async fn set_row(&self, row: Job) {
        self.rows.lock().await.insert(row.id, row);
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn create_job(
        &self,
        job_type: JobType,
        _parameters: &serde_json::Value,
    ) -> Result<SubmittedJob, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = job_row(id, job_type, JobStatus::Queued, 0, Utc::now());
        self.rows.lock().await.insert(id, row.clone());
        Ok(SubmittedJob {
            job: row,
            credits_estimated: Some(5),
        })
    }

    async fn fetch_job(&self, job_id: JobId) -> Result<Job, CoreError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(CoreError::Channel("fetch disabled".into()));
        }
        self.rows
            .lock()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| CoreError::Channel(format!("no such job {job_id}")))
    }

    async fn recent_active_job(&self, _window: Duration) -> Result<Option<Job>, CoreError> {
        if self.fail_recovery.load(Ordering::SeqCst) {
            return Err(CoreError::RecoveryQuery("recovery disabled".into()));
        }
        Ok(self.recovery_answer.lock().await.clone())
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError> {
        self.cancelled.lock().await.push(job_id);
        Ok(())
    }

    async fn fetch_outputs(&self, job_id: JobId) -> Result<Vec<String>, CoreError> {
        Ok(self
            .fallback_outputs
            .lock()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Feed the test pushes rows into.
#[derive(Default)]
pub struct FakeFeed {
    senders: Mutex<HashMap<JobId, mpsc::Sender<Job>>>,
}

impl FakeFeed {
    /// Deliver a row to the subscriber for `row.id`, if any.
    pub async fn push(&self, row: Job) {
        let sender = self.senders.lock().await.get(&row.id).cloned();
        if let Some(tx) = sender {
            let _ = tx.send(row).await;
        }
    }

    /// Whether a live subscription exists for `job_id`.
    pub async fn is_subscribed(&self, job_id: JobId) -> bool {
        match self.senders.lock().await.get(&job_id) {
            Some(tx) => !tx.is_closed(),
            None => false,
        }
    }
}

#[async_trait]
impl JobFeed for FakeFeed {
    async fn subscribe(&self, job_id: JobId) -> Result<mpsc::Receiver<Job>, CoreError> {
        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().await.insert(job_id, tx);
        Ok(rx)
    }
}

/// Socket the test sends events on.
pub struct FakeSocket {
    tx: broadcast::Sender<JobEvent>,
}

impl Default for FakeSocket {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }
}

impl FakeSocket {
    pub fn send(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventSocket for FakeSocket {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

/// Everything a test needs, wired together with fast intervals.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub feed: Arc<FakeFeed>,
    pub socket: Arc<FakeSocket>,
    pub store: Arc<MemoryStartTimeStore>,
    pub tracker: JobTracker,
}

/// Intervals short enough that tests finish in milliseconds.
pub fn fast_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval: Duration::from_millis(20),
        timeout_check_interval: Duration::from_millis(20),
        recovery_window: Duration::from_secs(900),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStartTimeStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStartTimeStore>) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let feed = Arc::new(FakeFeed::default());
        let socket = Arc::new(FakeSocket::default());
        let tracker = JobTracker::with_config(
            backend.clone(),
            feed.clone(),
            socket.clone(),
            store.clone(),
            fast_config(),
        );
        Self {
            backend,
            feed,
            socket,
            store,
            tracker,
        }
    }
}

/// Await a snapshot matching `pred`, with a 2-second safety net.
pub async fn wait_for<F>(rx: &mut watch::Receiver<Option<JobState>>, mut pred: F) -> JobState
where
    F: FnMut(&JobState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(ref state) = *current {
                    if pred(state) {
                        return state.clone();
                    }
                }
            }
            rx.changed().await.expect("snapshot channel closed");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

/// Give in-flight tasks a moment to (not) act.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(80)).await;
}
