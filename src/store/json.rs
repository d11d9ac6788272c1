//! File-Backed Run Store
//!
//! Persists run records as one JSON document under a state directory,
//! rewritten after every mutation. A crash mid-run therefore leaves the
//! most recent partial log on disk, not just the final one.
//!
//! The default state directory is `.modflow/` in the working directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::record::{ModuleRun, RunStatus, WorkflowInstance};
use super::{RunStore, StoreError};

/// Default state directory, relative to the working directory.
pub static DEFAULT_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| PathBuf::from(".modflow"));

/// File name of the record document inside the state directory.
const RECORDS_FILE: &str = "records.json";

/// On-disk shape of the store.
#[derive(Serialize, Deserialize, Default)]
struct Document {
    next_instance_id: i64,
    next_run_id: i64,
    instances: Vec<WorkflowInstance>,
    runs: Vec<ModuleRun>,
}

impl Document {
    fn instance_mut(&mut self, id: i64) -> Result<&mut WorkflowInstance, StoreError> {
        self.instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound {
                kind: "workflow instance",
                id,
            })
    }

    fn run_mut(&mut self, id: i64) -> Result<&mut ModuleRun, StoreError> {
        self.runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound {
                kind: "module run",
                id,
            })
    }
}

/// A [`RunStore`] persisting records to a JSON file.
pub struct JsonStore {
    path: PathBuf,
    document: Mutex<Document>,
}

impl JsonStore {
    /// Opens the store under `state_dir`, creating the directory and
    /// loading any existing records.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir)?;

        let path = state_dir.join(RECORDS_FILE);
        let document = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let document: Document = serde_json::from_str(&content)?;
            info!(
                "Loaded {} instances, {} runs from {}",
                document.instances.len(),
                document.runs.len(),
                path.display()
            );
            document
        } else {
            Document::default()
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Opens the store under the default state directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&*DEFAULT_STATE_DIR)
    }

    /// Returns the path of the record document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, json)?;
        debug!("Saved run records to {}", self.path.display());
        Ok(())
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut document = self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let value = f(&mut document)?;
        self.persist(&document)?;
        Ok(value)
    }

    fn read_document<T>(
        &self,
        f: impl FnOnce(&Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let document = self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&document)
    }
}

impl RunStore for JsonStore {
    fn create_or_reuse_instance(&self, workflow_id: i64) -> Result<i64, StoreError> {
        self.with_document(|document| {
            let existing = document
                .instances
                .iter_mut()
                .filter(|i| i.workflow_id == workflow_id)
                .max_by_key(|i| i.started_at);

            if let Some(instance) = existing {
                instance.status = RunStatus::Running;
                instance.started_at = Utc::now();
                instance.finished_at = None;
                return Ok(instance.id);
            }

            document.next_instance_id += 1;
            let id = document.next_instance_id;
            document.instances.push(WorkflowInstance {
                id,
                workflow_id,
                status: RunStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
            });
            Ok(id)
        })
    }

    fn create_module_run(
        &self,
        instance_id: i64,
        step_id: i64,
        input_ref: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.with_document(|document| {
            document.instance_mut(instance_id)?;

            document.next_run_id += 1;
            let id = document.next_run_id;
            document.runs.push(ModuleRun {
                id,
                workflow_instance_id: instance_id,
                workflow_step_id: step_id,
                status: RunStatus::Running,
                input_ref: input_ref.map(str::to_string),
                output_ref: None,
                started_at: Utc::now(),
                finished_at: None,
                log: String::new(),
            });
            Ok(id)
        })
    }

    fn update_run_log(&self, run_id: i64, log: &str) -> Result<(), StoreError> {
        self.with_document(|document| {
            document.run_mut(run_id)?.log = log.to_string();
            Ok(())
        })
    }

    fn finish_module_run(
        &self,
        run_id: i64,
        status: RunStatus,
        log: &str,
    ) -> Result<(), StoreError> {
        self.with_document(|document| {
            let run = document.run_mut(run_id)?;
            run.status = status;
            run.finished_at = Some(Utc::now());
            run.log = log.to_string();
            Ok(())
        })
    }

    fn finish_instance(&self, instance_id: i64, status: RunStatus) -> Result<(), StoreError> {
        self.with_document(|document| {
            let instance = document.instance_mut(instance_id)?;
            instance.status = status;
            instance.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    fn instance(&self, instance_id: i64) -> Result<WorkflowInstance, StoreError> {
        self.read_document(|document| {
            document
                .instances
                .iter()
                .find(|i| i.id == instance_id)
                .cloned()
                .ok_or(StoreError::NotFound {
                    kind: "workflow instance",
                    id: instance_id,
                })
        })
    }

    fn module_run(&self, run_id: i64) -> Result<ModuleRun, StoreError> {
        self.read_document(|document| {
            document
                .runs
                .iter()
                .find(|r| r.id == run_id)
                .cloned()
                .ok_or(StoreError::NotFound {
                    kind: "module run",
                    id: run_id,
                })
        })
    }

    fn runs_for_instance(&self, instance_id: i64) -> Result<Vec<ModuleRun>, StoreError> {
        self.read_document(|document| {
            Ok(document
                .runs
                .iter()
                .filter(|r| r.workflow_instance_id == instance_id)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_state_dir() {
        let temp_dir = tempdir().unwrap();
        let state_dir = temp_dir.path().join("state");

        let store = JsonStore::open(&state_dir).unwrap();
        assert!(state_dir.exists());
        assert_eq!(store.path(), state_dir.join(RECORDS_FILE));
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = tempdir().unwrap();

        let instance_id;
        let run_id;
        {
            let store = JsonStore::open(temp_dir.path()).unwrap();
            instance_id = store.create_or_reuse_instance(5).unwrap();
            run_id = store
                .create_module_run(instance_id, 1, Some("in.txt"))
                .unwrap();
            store.update_run_log(run_id, "partial output").unwrap();
        }

        // Reopen as a fresh process would
        let store = JsonStore::open(temp_dir.path()).unwrap();
        let run = store.module_run(run_id).unwrap();
        assert_eq!(run.workflow_instance_id, instance_id);
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.log, "partial output");
    }

    #[test]
    fn test_reuse_after_reopen() {
        let temp_dir = tempdir().unwrap();

        let first;
        {
            let store = JsonStore::open(temp_dir.path()).unwrap();
            first = store.create_or_reuse_instance(5).unwrap();
            store.finish_instance(first, RunStatus::Finished).unwrap();
        }

        let store = JsonStore::open(temp_dir.path()).unwrap();
        let second = store.create_or_reuse_instance(5).unwrap();

        assert_eq!(first, second);
        let instance = store.instance(second).unwrap();
        assert_eq!(instance.status, RunStatus::Running);
        assert!(instance.finished_at.is_none());
    }

    #[test]
    fn test_partial_log_on_disk_after_every_update() {
        let temp_dir = tempdir().unwrap();
        let store = JsonStore::open(temp_dir.path()).unwrap();

        let instance_id = store.create_or_reuse_instance(1).unwrap();
        let run_id = store.create_module_run(instance_id, 1, None).unwrap();
        store.update_run_log(run_id, "line one").unwrap();

        // Read the raw file, bypassing the in-memory cache
        let content = fs::read_to_string(store.path()).unwrap();
        let document: Document = serde_json::from_str(&content).unwrap();
        assert_eq!(document.runs[0].log, "line one");
    }

    #[test]
    fn test_ids_are_not_reused_across_reopen() {
        let temp_dir = tempdir().unwrap();

        {
            let store = JsonStore::open(temp_dir.path()).unwrap();
            let instance_id = store.create_or_reuse_instance(1).unwrap();
            store.create_module_run(instance_id, 1, None).unwrap();
        }

        let store = JsonStore::open(temp_dir.path()).unwrap();
        let instance_id = store.create_or_reuse_instance(1).unwrap();
        let run_id = store.create_module_run(instance_id, 2, None).unwrap();
        assert_eq!(run_id, 2);
    }
}
