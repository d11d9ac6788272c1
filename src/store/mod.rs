//! Run Record Store
//!
//! Persistence for [`WorkflowInstance`] and [`ModuleRun`] records.
//!
//! # Structure
//!
//! - [`record`]: Record types and status transitions
//! - [`json`]: File-backed store (one JSON document under a state directory)
//! - [`memory`]: In-memory store for tests and embedding

pub mod json;
pub mod memory;
pub mod record;

pub use json::JsonStore;
pub use memory::MemoryStore;
pub use record::{ModuleRun, RunStatus, WorkflowInstance};

use thiserror::Error;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error accessing run records: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode run records: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no {kind} with id {id}")]
    NotFound { kind: &'static str, id: i64 },
}

/// Persistence operations consumed by the execution engine.
///
/// Implementations use interior mutability so a store can be shared
/// between the caller and the engine's worker thread. Within one run the
/// worker is the only writer to its records; independent runs own
/// disjoint records and need no coordination beyond the store's own
/// locking.
pub trait RunStore: Send + Sync {
    /// Returns the instance to use for a new execution of `workflow_id`.
    ///
    /// Reuses the most recent instance for the workflow if one exists,
    /// resetting it to `running` with a fresh `started_at` and cleared
    /// `finished_at`; otherwise creates a new one.
    fn create_or_reuse_instance(&self, workflow_id: i64) -> Result<i64, StoreError>;

    /// Creates a run record for a step that is beginning to execute.
    ///
    /// The record starts in `running` status with `started_at` set to now.
    fn create_module_run(
        &self,
        instance_id: i64,
        step_id: i64,
        input_ref: Option<&str>,
    ) -> Result<i64, StoreError>;

    /// Replaces the cumulative log of an in-flight run.
    fn update_run_log(&self, run_id: i64, log: &str) -> Result<(), StoreError>;

    /// Moves a run to a terminal status, setting `finished_at` and the
    /// final log.
    fn finish_module_run(
        &self,
        run_id: i64,
        status: RunStatus,
        log: &str,
    ) -> Result<(), StoreError>;

    /// Moves an instance to a terminal status, setting `finished_at`.
    ///
    /// The engine never calls this: marking the overall instance done is
    /// the caller's responsibility once the run completes.
    fn finish_instance(&self, instance_id: i64, status: RunStatus) -> Result<(), StoreError>;

    /// Fetches an instance by id.
    fn instance(&self, instance_id: i64) -> Result<WorkflowInstance, StoreError>;

    /// Fetches a module run by id.
    fn module_run(&self, run_id: i64) -> Result<ModuleRun, StoreError>;

    /// Returns all runs belonging to an instance, oldest first.
    fn runs_for_instance(&self, instance_id: i64) -> Result<Vec<ModuleRun>, StoreError>;
}
