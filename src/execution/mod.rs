//! Execution Engine
//!
//! Core machinery for running workflows:
//!
//! - [`process`]: Spawning one module process with a live line stream
//! - [`step`]: Executing one step and recording its run
//! - [`engine`]: The sequencer driving steps in order on a worker thread
//! - [`events`]: Fan-out of log/step-finished/error events
//! - [`cancel`]: Cooperative cancellation token
//! - [`registry`]: Caller-owned map of active run handles

pub mod cancel;
pub mod engine;
pub mod events;
pub mod process;
pub mod registry;
pub mod step;

pub use cancel::CancelToken;
pub use engine::{Engine, EngineError, FailurePolicy, RunHandle, RunSummary, StepResult};
pub use events::{EventBus, RunEvent};
pub use process::{ProcessError, RunningProcess};
pub use registry::RunRegistry;
pub use step::{execute_step, StepOutcome};
