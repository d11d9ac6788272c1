//! Active-Run Registry
//!
//! Maps workflow ids to their in-flight [`RunHandle`]s. Owned by the
//! caller, never by the domain entities: a workflow knows nothing about
//! the thread currently executing it.

use std::collections::HashMap;

use super::engine::RunHandle;

/// Caller-owned map of workflow id to active run handle.
#[derive(Default)]
pub struct RunRegistry {
    active: HashMap<i64, RunHandle>,
}

impl RunRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a newly started run, returning any handle it replaces.
    pub fn insert(&mut self, workflow_id: i64, handle: RunHandle) -> Option<RunHandle> {
        self.active.insert(workflow_id, handle)
    }

    /// Returns true while the workflow has a live worker.
    pub fn is_running(&self, workflow_id: i64) -> bool {
        self.active
            .get(&workflow_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Requests cancellation of the workflow's run, if one is tracked.
    /// Returns true when a handle was found.
    pub fn stop(&self, workflow_id: i64) -> bool {
        match self.active.get(&workflow_id) {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Removes and returns the workflow's handle, e.g. to join it.
    pub fn take(&mut self, workflow_id: i64) -> Option<RunHandle> {
        self.active.remove(&workflow_id)
    }

    /// Drops handles whose workers have ended, detaching them.
    pub fn prune_finished(&mut self) {
        self.active.retain(|_, handle| !handle.is_finished());
    }

    /// Number of tracked handles, finished or not.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if no handles are tracked.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
