//! Single-writer merge of channel updates into canonical job state.
//!
//! Three channels (polling, row feed, session socket) deliver
//! [`JobUpdate`]s in arbitrary order. [`apply_update`] folds them into
//! one [`JobState`] under two guarantees:
//!
//! - progress never regresses,
//! - status only advances along the lifecycle rank order, and the first
//!   terminal value locks the state for good.
//!
//! The function is synchronous and idempotent per call, so the caller
//! only has to guarantee it is never re-entered concurrently.

use crate::job::{Job, JobStatus};
use crate::update::JobUpdate;

/// Canonical client-side state for one tracked job.
///
/// Owned exclusively by the reconcile loop; every other component
/// observes snapshots.
#[derive(Debug, Clone)]
pub struct JobState {
    pub job: Job,
    /// Set once a terminal status is adopted. A locked state ignores
    /// all further updates.
    pub locked: bool,
}

impl JobState {
    /// Wrap a freshly fetched or submitted job row.
    ///
    /// The row itself may already be terminal (recovery can race a
    /// fast job); the lock reflects that.
    pub fn new(job: Job) -> Self {
        let locked = job.status.is_terminal();
        Self { job, locked }
    }
}

/// Result of merging one update into canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The update changed canonical state.
    Applied {
        /// This update moved the job into a terminal status.
        terminal: bool,
    },
    /// The update carried nothing newer; state is unchanged.
    Unchanged,
    /// State is locked; the update was dropped.
    Discarded,
    /// State is locked and the update carried a *different* terminal
    /// status. Logged by the caller, never surfaced to the user.
    TerminalConflict { incoming: JobStatus },
}

/// Merge one update into `state`.
///
/// Rules, in order:
/// 1. a locked state drops the update (conflicting terminals are
///    reported as [`MergeOutcome::TerminalConflict`]);
/// 2. progress is `max(current, incoming)`;
/// 3. status is adopted when strictly later in rank; a terminal status
///    is adopted unconditionally and locks the state;
/// 4. stage, outputs, and error message fill in when the update carries
///    them.
pub fn apply_update(state: &mut JobState, update: &JobUpdate) -> MergeOutcome {
    if state.locked {
        return match update.status {
            Some(incoming) if incoming.is_terminal() && incoming != state.job.status => {
                MergeOutcome::TerminalConflict { incoming }
            }
            _ => MergeOutcome::Discarded,
        };
    }

    let job = &mut state.job;
    let mut changed = false;
    let mut terminal = false;

    if let Some(p) = update.progress {
        let p = p.clamp(0, 100);
        if p > job.progress {
            job.progress = p;
            changed = true;
        }
    }

    if let Some(incoming) = update.status {
        if incoming.is_terminal() {
            job.status = incoming;
            state.locked = true;
            terminal = true;
            changed = true;
        } else if incoming.rank() > job.status.rank() {
            job.status = incoming;
            changed = true;
        }
    }

    if let Some(ref stage) = update.current_stage {
        if job.current_stage.as_ref() != Some(stage) {
            job.current_stage = Some(stage.clone());
            changed = true;
        }
    }

    if let Some(ref outputs) = update.outputs {
        if job.outputs.as_ref() != Some(outputs) {
            job.outputs = Some(outputs.clone());
            changed = true;
        }
    }

    if let Some(ref message) = update.error_message {
        if job.error_message.as_ref() != Some(message) {
            job.error_message = Some(message.clone());
            changed = true;
        }
    }

    if changed {
        MergeOutcome::Applied { terminal }
    } else {
        MergeOutcome::Unchanged
    }
}
