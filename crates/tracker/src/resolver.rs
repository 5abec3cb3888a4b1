//! Resolves the produced assets once a job completes.
//!
//! Prefers the outputs embedded in the completion payload; falls back
//! to a single lookup by job id when they are missing or empty. Either
//! way every reference gets a cache-defeating token before observers
//! see it. Resolution failure is a warning, never a job failure.

use lumeo_core::backend::JobBackend;
use lumeo_core::job::Job;

/// Resolve and rewrite `job.outputs` in place.
pub(crate) async fn resolve(backend: &dyn JobBackend, job: &mut Job) {
    let outputs = match job.outputs {
        Some(ref outputs) if !outputs.is_empty() => outputs.clone(),
        _ => match backend.fetch_outputs(job.id).await {
            Ok(outputs) if !outputs.is_empty() => {
                tracing::debug!(job_id = job.id, count = outputs.len(), "Outputs resolved via lookup");
                outputs
            }
            Ok(_) => {
                tracing::warn!(job_id = job.id, "Completed job has no resolvable outputs");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "Output lookup failed, job stays completed");
                return;
            }
        },
    };

    job.outputs = Some(outputs.into_iter().map(append_cache_buster).collect());
}

/// Append a cache-defeating token so observers never load a stale
/// cached copy of an asset that was regenerated under the same path.
fn append_cache_buster(reference: String) -> String {
    let token = uuid::Uuid::new_v4().simple();
    let separator = if reference.contains('?') { '&' } else { '?' };
    format!("{reference}{separator}cb={token}")
}
