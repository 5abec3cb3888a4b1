//! Recovery scan: re-attach to a still-active job after a restart.
//!
//! Asks the backend for the user's newest non-terminal job inside the
//! recovery window. A query failure is treated exactly like "nothing
//! found" -- the controller starts idle, never stuck.

use std::time::Duration;

use chrono::Utc;

use lumeo_core::backend::JobBackend;
use lumeo_core::job::Job;

/// Jobs older than this are never recovered.
pub const RECOVERY_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Find a recoverable job, if one exists.
///
/// The backend applies the owner / non-terminal / recency filters;
/// both are re-checked locally so a lax backend cannot hand back an
/// ancient or finished job.
pub(crate) async fn scan(backend: &dyn JobBackend, window: Duration) -> Option<Job> {
    let job = match backend.recent_active_job(window).await {
        Ok(found) => found?,
        Err(e) => {
            tracing::warn!(error = %e, "Recovery query failed, starting idle");
            return None;
        }
    };

    if job.status.is_terminal() {
        tracing::debug!(job_id = job.id, status = ?job.status, "Recovery candidate already terminal");
        return None;
    }

    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::MAX);
    if Utc::now() - job.created_at > window {
        tracing::debug!(job_id = job.id, created_at = %job.created_at, "Recovery candidate too old");
        return None;
    }

    tracing::info!(job_id = job.id, status = ?job.status, "Recoverable job found");
    Some(job)
}
