//! Process-wide registry of workflow records.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use recast_types::{Timestamp, now};

use crate::record::{Summary, WorkflowHandle, WorkflowId, WorkflowRecord};

/// Owns every workflow record for the life of the process.
///
/// Nothing is persisted: a restart loses all workflow history.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<WorkflowId, WorkflowHandle>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new record with four pending steps.
    pub fn create(&self, summary: Summary) -> WorkflowHandle {
        let mut workflows = self.workflows.write();
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !workflows.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle = WorkflowHandle::new(WorkflowRecord::new(id.clone(), summary, now()));
        workflows.insert(id, handle.clone());
        debug!(workflow_id = %handle.id(), "Workflow created");
        handle
    }

    /// Snapshot of one record.
    pub fn get(&self, id: &str) -> Option<WorkflowRecord> {
        self.handle(id).map(|h| h.snapshot())
    }

    /// Live handle to one record.
    pub fn handle(&self, id: &str) -> Option<WorkflowHandle> {
        self.workflows.read().get(id).cloned()
    }

    /// Snapshots of every record, newest first.
    pub fn list(&self) -> Vec<WorkflowRecord> {
        let handles: Vec<WorkflowHandle> = self.workflows.read().values().cloned().collect();
        let mut records: Vec<WorkflowRecord> = handles.iter().map(|h| h.snapshot()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Remove every record created more than `max_age` ago, whatever its status.
    ///
    /// Returns the number removed. An age too large to subtract from the
    /// current instant removes nothing.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.evict_created_before(cutoff),
            None => 0,
        }
    }

    /// Remove every record with `created_at < cutoff`.
    pub fn evict_created_before(&self, cutoff: Timestamp) -> usize {
        let mut workflows = self.workflows.write();
        let before = workflows.len();
        workflows.retain(|_, handle| handle.created_at() >= cutoff);
        let removed = before - workflows.len();
        if removed > 0 {
            debug!(removed, cutoff = %cutoff, "Evicted workflows");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.workflows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.read().is_empty()
    }

    /// Records that have not reached a terminal status.
    pub fn active_count(&self) -> usize {
        let handles: Vec<WorkflowHandle> = self.workflows.read().values().cloned().collect();
        handles.iter().filter(|h| !h.status().is_terminal()).count()
    }

    #[cfg(test)]
    fn insert(&self, record: WorkflowRecord) -> WorkflowHandle {
        let handle = WorkflowHandle::new(record);
        self.workflows
            .write()
            .insert(handle.id().to_string(), handle.clone());
        handle
    }
}
