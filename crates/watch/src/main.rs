//! `lumeo-watch` -- submit-and-watch daemon for lumeo generation jobs.
//!
//! Recovers an in-flight job from a previous run (or submits a new one
//! when `SUBMIT_JOB_TYPE` is set) and logs canonical snapshots until
//! the job reaches a terminal state. Interrupting the process leaves
//! the job recoverable for the next run.
//!
//! # Environment variables
//!
//! | Variable           | Required | Default           | Description                                       |
//! |--------------------|----------|-------------------|---------------------------------------------------|
//! | `LUMEO_API_URL`    | yes      | --                | Backend HTTP endpoint, e.g. `http://host:3000`    |
//! | `LUMEO_WS_URL`     | yes      | --                | Backend WebSocket endpoint, e.g. `ws://host:3000` |
//! | `LUMEO_STATE_FILE` | no       | `lumeo_jobs.json` | Durable start-time record path                    |
//! | `SUBMIT_JOB_TYPE`  | no       | --                | `image` or `video`; submit when nothing recovers  |
//! | `SUBMIT_PARAMS`    | no       | `{}`              | JSON generation parameters                        |

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumeo_client::api::BackendApi;
use lumeo_client::feed::RowFeed;
use lumeo_client::socket::SocketSession;
use lumeo_core::job::JobType;
use lumeo_tracker::{FileStartTimeStore, JobTracker};

/// Default location of the durable start-time record.
const DEFAULT_STATE_FILE: &str = "lumeo_jobs.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lumeo_watch=info,lumeo_tracker=info,lumeo_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_url = require_env("LUMEO_API_URL");
    let ws_url = require_env("LUMEO_WS_URL");
    let state_file =
        std::env::var("LUMEO_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.into());

    let backend = Arc::new(BackendApi::new(api_url));
    let feed = Arc::new(RowFeed::new(ws_url.clone()));
    let socket = SocketSession::start(ws_url);
    let store = Arc::new(FileStartTimeStore::open(&state_file).await?);

    let tracker = JobTracker::new(backend, feed, socket.clone(), store);

    let mut job_id = tracker.recover().await;
    if job_id.is_none() {
        if let Ok(kind) = std::env::var("SUBMIT_JOB_TYPE") {
            let job_type = parse_job_type(&kind)?;
            let parameters = match std::env::var("SUBMIT_PARAMS") {
                Ok(raw) => serde_json::from_str(&raw)?,
                Err(_) => serde_json::json!({}),
            };
            job_id = Some(tracker.submit(job_type, &parameters).await?);
        }
    }

    let Some(job_id) = job_id else {
        tracing::info!("No job to recover or submit; exiting");
        socket.shutdown().await;
        return Ok(());
    };

    tracing::info!(job_id, "Watching job until it settles");
    let mut snapshots = tracker.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(job_id, "Interrupted; leaving the job recoverable");
                tracker.shutdown().await;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(state) = snapshots.borrow_and_update().clone() else {
                    continue;
                };
                tracing::info!(
                    job_id = state.job.id,
                    status = ?state.job.status,
                    progress = state.job.progress,
                    stage = state.job.current_stage.as_deref().unwrap_or("-"),
                    "Job update",
                );
                if state.locked {
                    if let Some(outputs) = state.job.outputs {
                        for reference in outputs {
                            tracing::info!(%reference, "Output ready");
                        }
                    }
                    if let Some(error) = state.job.error_message {
                        tracing::warn!(%error, "Job error");
                    }
                    break;
                }
            }
        }
    }

    socket.shutdown().await;
    Ok(())
}

fn require_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        tracing::error!("{name} environment variable is required");
        std::process::exit(1);
    })
}

fn parse_job_type(raw: &str) -> anyhow::Result<JobType> {
    match raw {
        "image" => Ok(JobType::Image),
        "video" => Ok(JobType::Video),
        other => anyhow::bail!("unknown job type '{other}' (expected image or video)"),
    }
}
