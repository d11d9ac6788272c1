//! Step Executor
//!
//! Runs one workflow step to completion: creates its run record, streams
//! the module's output through the event bus while persisting the
//! cumulative log after every line, and records the terminal status.
//!
//! Failures never escape a step. A module with no executable is skipped
//! without a run record; spawn, stream, and store errors mark the run
//! `failed` and the sequence moves on.

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use log::{debug, error, info};

use crate::store::{RunStatus, RunStore, StoreError};
use crate::workflow::WorkflowStep;

use super::cancel::CancelToken;
use super::events::EventBus;
use super::process::{ProcessError, RunningProcess};

/// Interval between cancellation checks while the line stream is quiet.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal outcome of one step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The module had no executable configured; no run record exists
    Skipped,
    /// The process exited with code zero
    Finished,
    /// The process exited nonzero, or spawning/streaming failed
    Failed,
}

/// Errors internal to one step attempt; callers of [`execute_step`] only
/// ever see them as a `Failed` outcome plus an error event.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Executes a single workflow step.
///
/// The input payload is piped to the module only when the module
/// declares `needs_input` and the step carries one. Every output line is
/// forwarded through `events`, appended to the in-memory log, and
/// written back to the run record, so a crash mid-run leaves the latest
/// partial log visible.
///
/// Cancellation is observed inside the read loop: the process is told to
/// terminate and the step still settles to a terminal status from its
/// exit code.
pub fn execute_step(
    step: &WorkflowStep,
    instance_id: i64,
    store: &dyn RunStore,
    events: &EventBus,
    cancel: &CancelToken,
) -> StepOutcome {
    let module = &step.module;

    if !module.has_executable() {
        info!("Module '{}' has no executable configured, skipping", module.name);
        events.log(format!("{}: no executable configured.", module.name));
        return StepOutcome::Skipped;
    }

    let run_id = match store.create_module_run(instance_id, step.id, step.input_ref.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            error!("Could not create run record for '{}': {}", module.name, e);
            events.error(e.to_string());
            events.step_finished();
            return StepOutcome::Failed;
        }
    };

    events.log(format!("Running {}...", module.name));

    let outcome = match stream_to_completion(step, run_id, store, events, cancel) {
        Ok(status) => {
            debug!("Step '{}' ended as {}", module.name, status);
            if status == RunStatus::Finished {
                StepOutcome::Finished
            } else {
                StepOutcome::Failed
            }
        }
        Err(e) => {
            error!("Step '{}' failed: {}", module.name, e);
            let _ = store.finish_module_run(run_id, RunStatus::Failed, &e.to_string());
            events.error(e.to_string());
            StepOutcome::Failed
        }
    };

    events.step_finished();
    events.log(format!("Finished {}", module.name));
    outcome
}

/// Spawns the module process and drives it to a terminal run status.
fn stream_to_completion(
    step: &WorkflowStep,
    run_id: i64,
    store: &dyn RunStore,
    events: &EventBus,
    cancel: &CancelToken,
) -> Result<RunStatus, StepError> {
    let payload = if step.module.needs_input {
        step.input.as_deref()
    } else {
        None
    };

    let process = RunningProcess::spawn(&step.module.executable, payload)?;
    let mut log_lines: Vec<String> = Vec::new();
    let mut stream_error: Option<StoreError> = None;

    loop {
        if cancel.is_cancelled() {
            events.log("Execution stopped by user.");
            process.terminate();
            break;
        }

        match process.lines().recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(line) => {
                events.log(line.clone());
                log_lines.push(line);
                if let Err(e) = store.update_run_log(run_id, &log_lines.join("\n")) {
                    // The child must still be reaped below
                    stream_error = Some(e);
                    process.terminate();
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let exit = process.wait()?;
    if let Some(e) = stream_error {
        return Err(e.into());
    }
    let status = if exit.success() {
        RunStatus::Finished
    } else {
        RunStatus::Failed
    };

    store.finish_module_run(run_id, status, &log_lines.join("\n"))?;
    Ok(status)
}
