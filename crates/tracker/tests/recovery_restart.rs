//! Recovery-after-restart behavior, including timeout durability.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use common::{job_row, wait_for, Harness};
use lumeo_core::job::{JobStatus, JobType};
use lumeo_core::store::StartTimeStore;
use lumeo_tracker::MemoryStartTimeStore;

#[tokio::test]
async fn recovers_a_recent_processing_job() {
    let h = Harness::new();
    let row = job_row(
        11,
        JobType::Image,
        JobStatus::Processing,
        30,
        Utc::now() - ChronoDuration::minutes(5),
    );
    *h.backend.recovery_answer.lock().await = Some(row.clone());
    h.backend.set_row(row).await;

    assert_eq!(h.tracker.recover().await, Some(11));
    assert_eq!(h.tracker.tracked_job_id().await, Some(11));

    let mut rx = h.tracker.subscribe();
    let state = wait_for(&mut rx, |s| s.job.id == 11).await;
    assert_eq!(state.job.status, JobStatus::Processing);
}

#[tokio::test]
async fn does_not_recover_an_old_job() {
    let h = Harness::new();
    *h.backend.recovery_answer.lock().await = Some(job_row(
        12,
        JobType::Image,
        JobStatus::Processing,
        30,
        Utc::now() - ChronoDuration::minutes(20),
    ));

    assert_eq!(h.tracker.recover().await, None);
    assert_eq!(h.tracker.tracked_job_id().await, None);
}

#[tokio::test]
async fn does_not_recover_a_completed_job() {
    let h = Harness::new();
    *h.backend.recovery_answer.lock().await = Some(job_row(
        13,
        JobType::Image,
        JobStatus::Completed,
        100,
        Utc::now() - ChronoDuration::minutes(5),
    ));

    assert_eq!(h.tracker.recover().await, None);
}

#[tokio::test]
async fn recovery_query_failure_means_idle() {
    let h = Harness::new();
    h.backend.fail_recovery.store(true, Ordering::SeqCst);

    assert_eq!(h.tracker.recover().await, None);
    assert_eq!(h.tracker.tracked_job_id().await, None);
    // Idle, not stuck: a submission still works.
    h.backend.fail_recovery.store(false, Ordering::SeqCst);
    assert!(h
        .tracker
        .submit(JobType::Image, &serde_json::json!({}))
        .await
        .is_ok());
}

#[tokio::test]
async fn nothing_to_recover_means_idle() {
    let h = Harness::new();
    assert_eq!(h.tracker.recover().await, None);
    assert!(h.tracker.current().is_none());
}

#[tokio::test]
async fn forced_timeout_fires_for_an_overdue_job() {
    // Scenario C: an image job submitted 181 seconds ago is still
    // processing -- the supervisor forces timed_out and detaches.
    let h = Harness::new();
    let row = job_row(
        21,
        JobType::Image,
        JobStatus::Processing,
        70,
        Utc::now() - ChronoDuration::seconds(181),
    );
    *h.backend.recovery_answer.lock().await = Some(row.clone());
    h.backend.set_row(row).await;

    assert_eq!(h.tracker.recover().await, Some(21));

    let mut rx = h.tracker.subscribe();
    let state = wait_for(&mut rx, |s| s.job.status == JobStatus::TimedOut).await;
    assert!(state.locked);
    // Progress survives; only the status was forced.
    assert_eq!(state.job.progress, 70);

    assert_eq!(h.tracker.tracked_job_id().await, None);
    assert_eq!(h.store.get(21).await.unwrap(), None);

    common::settle().await;
    assert!(!h.feed.is_subscribed(21).await);
}

#[tokio::test]
async fn timeout_is_measured_from_the_persisted_original_start() {
    // The row looks fresh, but the durable record says the job started
    // 200 seconds ago. A restart must not grant extra runtime.
    let store = Arc::new(MemoryStartTimeStore::new());
    store
        .put(22, Utc::now() - ChronoDuration::seconds(200))
        .await
        .unwrap();

    let h = Harness::with_store(store);
    let row = job_row(
        22,
        JobType::Image,
        JobStatus::Processing,
        40,
        Utc::now() - ChronoDuration::seconds(30),
    );
    *h.backend.recovery_answer.lock().await = Some(row.clone());
    h.backend.set_row(row).await;

    assert_eq!(h.tracker.recover().await, Some(22));

    let mut rx = h.tracker.subscribe();
    let state = wait_for(&mut rx, |s| s.job.status == JobStatus::TimedOut).await;
    assert!(state.locked);
}

#[tokio::test]
async fn a_job_within_budget_is_not_timed_out() {
    let h = Harness::new();
    let row = job_row(
        23,
        JobType::Video,
        JobStatus::Processing,
        50,
        Utc::now() - ChronoDuration::seconds(181),
    );
    *h.backend.recovery_answer.lock().await = Some(row.clone());
    h.backend.set_row(row).await;

    // 181s is past the image budget but well inside the video budget.
    assert_eq!(h.tracker.recover().await, Some(23));
    common::settle().await;

    let state = h.tracker.current().unwrap();
    assert_eq!(state.job.status, JobStatus::Processing);
    assert_eq!(h.tracker.tracked_job_id().await, Some(23));
}

#[tokio::test]
async fn shutdown_keeps_the_durable_record_for_the_next_run() {
    let h = Harness::new();
    let job_id = h
        .tracker
        .submit(JobType::Image, &serde_json::json!({}))
        .await
        .unwrap();
    assert!(h.store.get(job_id).await.unwrap().is_some());

    h.tracker.shutdown().await;

    // Still there: the next start recovers with the original clock.
    assert!(h.store.get(job_id).await.unwrap().is_some());
    assert_eq!(h.tracker.tracked_job_id().await, None);
}
