//! In-Memory Run Store
//!
//! Keeps all records in process memory. Used by tests and by callers
//! that do not need persistence across restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use super::record::{ModuleRun, RunStatus, WorkflowInstance};
use super::{RunStore, StoreError};

#[derive(Default)]
struct Tables {
    instances: HashMap<i64, WorkflowInstance>,
    runs: HashMap<i64, ModuleRun>,
    next_instance_id: i64,
    next_run_id: i64,
}

/// A [`RunStore`] backed by in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut tables)
    }
}

impl RunStore for MemoryStore {
    fn create_or_reuse_instance(&self, workflow_id: i64) -> Result<i64, StoreError> {
        self.with_tables(|tables| {
            let existing = tables
                .instances
                .values_mut()
                .filter(|i| i.workflow_id == workflow_id)
                .max_by_key(|i| i.started_at);

            if let Some(instance) = existing {
                instance.status = RunStatus::Running;
                instance.started_at = Utc::now();
                instance.finished_at = None;
                return Ok(instance.id);
            }

            tables.next_instance_id += 1;
            let id = tables.next_instance_id;
            tables.instances.insert(
                id,
                WorkflowInstance {
                    id,
                    workflow_id,
                    status: RunStatus::Running,
                    started_at: Utc::now(),
                    finished_at: None,
                },
            );
            Ok(id)
        })
    }

    fn create_module_run(
        &self,
        instance_id: i64,
        step_id: i64,
        input_ref: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.with_tables(|tables| {
            if !tables.instances.contains_key(&instance_id) {
                return Err(StoreError::NotFound {
                    kind: "workflow instance",
                    id: instance_id,
                });
            }

            tables.next_run_id += 1;
            let id = tables.next_run_id;
            tables.runs.insert(
                id,
                ModuleRun {
                    id,
                    workflow_instance_id: instance_id,
                    workflow_step_id: step_id,
                    status: RunStatus::Running,
                    input_ref: input_ref.map(str::to_string),
                    output_ref: None,
                    started_at: Utc::now(),
                    finished_at: None,
                    log: String::new(),
                },
            );
            Ok(id)
        })
    }

    fn update_run_log(&self, run_id: i64, log: &str) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let run = tables.runs.get_mut(&run_id).ok_or(StoreError::NotFound {
                kind: "module run",
                id: run_id,
            })?;
            run.log = log.to_string();
            Ok(())
        })
    }

    fn finish_module_run(
        &self,
        run_id: i64,
        status: RunStatus,
        log: &str,
    ) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let run = tables.runs.get_mut(&run_id).ok_or(StoreError::NotFound {
                kind: "module run",
                id: run_id,
            })?;
            run.status = status;
            run.finished_at = Some(Utc::now());
            run.log = log.to_string();
            Ok(())
        })
    }

    fn finish_instance(&self, instance_id: i64, status: RunStatus) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let instance = tables
                .instances
                .get_mut(&instance_id)
                .ok_or(StoreError::NotFound {
                    kind: "workflow instance",
                    id: instance_id,
                })?;
            instance.status = status;
            instance.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    fn instance(&self, instance_id: i64) -> Result<WorkflowInstance, StoreError> {
        self.with_tables(|tables| {
            tables
                .instances
                .get(&instance_id)
                .cloned()
                .ok_or(StoreError::NotFound {
                    kind: "workflow instance",
                    id: instance_id,
                })
        })
    }

    fn module_run(&self, run_id: i64) -> Result<ModuleRun, StoreError> {
        self.with_tables(|tables| {
            tables.runs.get(&run_id).cloned().ok_or(StoreError::NotFound {
                kind: "module run",
                id: run_id,
            })
        })
    }

    fn runs_for_instance(&self, instance_id: i64) -> Result<Vec<ModuleRun>, StoreError> {
        self.with_tables(|tables| {
            let mut runs: Vec<ModuleRun> = tables
                .runs
                .values()
                .filter(|r| r.workflow_instance_id == instance_id)
                .cloned()
                .collect();
            runs.sort_by_key(|r| r.id);
            Ok(runs)
        })
    }
}
