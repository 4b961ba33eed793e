//! In-process task store.

use super::TaskStore;
use crate::error::{OpsError, Result};
use crate::task::{TaskId, TaskRecord, TaskUpdate};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Task records kept in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<TaskId, TaskRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<TaskId, TaskRecord>> {
        // A panicking writer cannot leave a half-applied record behind: updates are
        // applied to a single entry in place.
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl TaskStore for MemoryStore {
    fn insert(&self, record: &TaskRecord) -> Result<()> {
        let mut records = self.records();
        if records.contains_key(&record.id) {
            return Err(OpsError::StoreError(format!(
                "task record {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>> {
        Ok(self.records().get(id).cloned())
    }

    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<()> {
        let mut records = self.records();
        let record = records.get_mut(id).ok_or_else(|| OpsError::not_found(id))?;
        update.apply_to(record);
        Ok(())
    }

    fn delete(&self, id: &TaskId) -> Result<()> {
        self.records()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| OpsError::not_found(id))
    }

    fn find_all(&self) -> Result<Vec<TaskRecord>> {
        Ok(self.records().values().cloned().collect())
    }
}
