//! Modflow - Sequential Workflow Execution Engine
//!
//! A library for composing named processing modules (each backed by one
//! external executable) into ordered workflows and executing them one
//! step at a time, with live output streaming, persisted run records,
//! and cooperative mid-run cancellation.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`workflow`]: Data structures and YAML loading for definitions
//! - [`execution`]: The sequencer, step executor, and process runner
//! - [`store`]: Persistence of workflow instances and module runs
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modflow::execution::Engine;
//! use modflow::store::{JsonStore, RunStatus, RunStore};
//! use modflow::workflow::load_definition;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = load_definition("pipeline.yaml")?;
//!     let store: Arc<dyn RunStore> = Arc::new(JsonStore::open_default()?);
//!     let instance_id = store.create_or_reuse_instance(workflow.id)?;
//!
//!     let engine = Engine::new(Arc::clone(&store));
//!     let handle = engine.start(workflow.ordered_steps(), instance_id);
//!
//!     let summary = handle.join()?;
//!     store.finish_instance(instance_id, RunStatus::Finished)?;
//!     println!("{} steps attempted", summary.steps.len());
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use execution::{CancelToken, Engine, EventBus, FailurePolicy, RunEvent, RunHandle, RunRegistry};
pub use store::{JsonStore, MemoryStore, ModuleRun, RunStatus, RunStore, WorkflowInstance};
pub use workflow::{load_definition, Module, Workflow, WorkflowStep};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Modflow";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "Modflow");
    }

    #[test]
    fn test_module_exports() {
        let module = Module::new("check").with_executable("/bin/true");
        let step = WorkflowStep::new(module, 1);
        assert_eq!(step.position, 1);
        assert_eq!(step.module.name, "check");
    }
}
