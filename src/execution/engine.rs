//! Workflow Sequencer
//!
//! Drives the steps of one workflow instance strictly in ascending
//! position order, one at a time, on a dedicated worker thread. The
//! caller's control path is never blocked by step execution; it observes
//! the run through the event bus and the returned [`RunHandle`].
//!
//! A `failed` step does not halt the sequence by default: steps are
//! treated as independent enough that downstream steps may still be
//! useful or diagnostic. The policy is explicit and can be flipped to
//! [`FailurePolicy::Halt`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use thiserror::Error;

use crate::store::RunStore;
use crate::workflow::WorkflowStep;

use super::cancel::CancelToken;
use super::events::EventBus;
use super::step::{execute_step, StepOutcome};

/// What the sequencer does after a step ends in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Proceed to the next step regardless of the previous outcome
    #[default]
    Continue,
    /// Stop the sequence at the first failed step
    Halt,
}

/// Errors surfaced by a run handle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sequencer worker panicked")]
    WorkerPanicked,
}

/// Outcome of one attempted step, as seen by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Id of the attempted step
    pub step_id: i64,
    /// Module name, for reporting
    pub module_name: String,
    /// Terminal outcome of the attempt
    pub outcome: StepOutcome,
}

/// Summary returned by the worker once the sequence ends.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Outcomes of the steps that were attempted, in execution order
    pub steps: Vec<StepResult>,
    /// True when the sequence ended because of cancellation
    pub cancelled: bool,
}

impl RunSummary {
    /// Returns true if no attempted step failed.
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.outcome != StepOutcome::Failed)
    }
}

/// Sequential workflow execution engine.
///
/// One engine can start many runs; each run gets its own worker thread,
/// cancel token, and run records. The engine never marks the overall
/// [`WorkflowInstance`](crate::store::WorkflowInstance) finished — that
/// is the caller's job once the handle completes.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use modflow::execution::Engine;
/// use modflow::store::{MemoryStore, RunStore};
/// use modflow::workflow::{Module, WorkflowStep};
///
/// let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
/// let instance_id = store.create_or_reuse_instance(1).unwrap();
///
/// let engine = Engine::new(Arc::clone(&store));
/// let steps = vec![WorkflowStep::new(
///     Module::new("greet").with_executable("./greet.sh"),
///     1,
/// )];
///
/// let handle = engine.start(steps, instance_id);
/// let summary = handle.join().unwrap();
/// assert!(summary.all_succeeded());
/// ```
pub struct Engine {
    store: Arc<dyn RunStore>,
    events: Arc<EventBus>,
    failure_policy: FailurePolicy,
}

impl Engine {
    /// Creates an engine writing run records to `store`.
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            store,
            events: Arc::new(EventBus::new()),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Sets what happens after a failed step.
    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.failure_policy = policy;
    }

    /// The event bus runs publish on; subscribe before calling
    /// [`start`](Self::start) to observe every event.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Starts executing `steps` against `instance_id` on a new worker
    /// thread and returns a handle to observe and stop the run.
    pub fn start(&self, mut steps: Vec<WorkflowStep>, instance_id: i64) -> RunHandle {
        steps.sort_by_key(|s| s.position);

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);
        let policy = self.failure_policy;

        info!(
            "Starting workflow instance {} ({} steps)",
            instance_id,
            steps.len()
        );

        let worker = thread::spawn(move || {
            run_sequence(&steps, instance_id, store.as_ref(), &events, &worker_cancel, policy)
        });

        RunHandle { cancel, worker }
    }
}

/// The worker body: one step at a time, in position order.
fn run_sequence(
    steps: &[WorkflowStep],
    instance_id: i64,
    store: &dyn RunStore,
    events: &EventBus,
    cancel: &CancelToken,
    policy: FailurePolicy,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for step in steps {
        if cancel.is_cancelled() {
            events.log("Execution stopped by user.");
            break;
        }

        let outcome = execute_step(step, instance_id, store, events, cancel);
        summary.steps.push(StepResult {
            step_id: step.id,
            module_name: step.module.name.clone(),
            outcome,
        });

        if outcome == StepOutcome::Failed && policy == FailurePolicy::Halt {
            warn!(
                "Halting instance {} after failed step '{}'",
                instance_id, step.module.name
            );
            events.log(format!(
                "Halting after failed step {}.",
                step.module.name
            ));
            break;
        }
    }

    summary.cancelled = cancel.is_cancelled();
    info!(
        "Workflow instance {} worker done ({} steps attempted, cancelled: {})",
        instance_id,
        summary.steps.len(),
        summary.cancelled
    );
    summary
}

/// Handle to an in-flight sequencer run.
///
/// Dropping the handle detaches the worker; the run keeps going. Hold
/// handles in a [`RunRegistry`](super::registry::RunRegistry) when
/// managing several concurrent runs.
pub struct RunHandle {
    cancel: CancelToken,
    worker: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Requests cancellation: no new step starts, and the active step's
    /// process is asked to terminate. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the worker has ended.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// The run's cancel token, for callers wiring their own signals.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Waits for the worker and returns the run summary.
    pub fn join(self) -> Result<RunSummary, EngineError> {
        self.worker.join().map_err(|_| EngineError::WorkerPanicked)
    }
}
