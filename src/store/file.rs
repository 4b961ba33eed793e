//! File-backed task store: one pretty-printed JSON document per task.

use super::TaskStore;
use crate::error::{OpsError, Result};
use crate::fs::atomic_write;
use crate::task::{TaskId, TaskRecord, TaskUpdate};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Task records stored as `{dir}/{id}.json`.
///
/// Writes within one process are serialized by an internal mutex so that
/// read-modify-write updates never interleave.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) the collection directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            OpsError::StoreError(format!(
                "failed to create task collection '{}': {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the document for `id`.
    pub fn document_path(&self, id: &TaskId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn read_document(path: &Path) -> Result<TaskRecord> {
        let content = fs::read_to_string(path).map_err(|e| {
            OpsError::StoreError(format!(
                "failed to read task record '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            OpsError::StoreError(format!(
                "failed to parse task record '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn write_document(&self, record: &TaskRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            OpsError::StoreError(format!(
                "failed to serialize task record {}: {}",
                record.id, e
            ))
        })?;
        atomic_write(self.document_path(&record.id), json.as_bytes())
    }
}

impl TaskStore for FileStore {
    fn insert(&self, record: &TaskRecord) -> Result<()> {
        let _writer = self.writer();
        if self.document_path(&record.id).exists() {
            return Err(OpsError::StoreError(format!(
                "task record {} already exists",
                record.id
            )));
        }
        self.write_document(record)
    }

    fn find_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>> {
        let path = self.document_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_document(&path).map(Some)
    }

    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<()> {
        let _writer = self.writer();
        let path = self.document_path(id);
        if !path.exists() {
            return Err(OpsError::not_found(id));
        }

        let mut record = Self::read_document(&path)?;
        update.apply_to(&mut record);
        self.write_document(&record)
    }

    fn delete(&self, id: &TaskId) -> Result<()> {
        let _writer = self.writer();
        let path = self.document_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OpsError::not_found(id)),
            Err(e) => Err(OpsError::StoreError(format!(
                "failed to delete task record '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn find_all(&self) -> Result<Vec<TaskRecord>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            OpsError::StoreError(format!(
                "failed to read task collection '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                OpsError::StoreError(format!("failed to read task collection entry: {}", e))
            })?;
            let path = entry.path();

            // Skip temp files and anything that is not a task document
            let is_document = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if !is_document {
                continue;
            }

            match Self::read_document(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable task record: {}", e),
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
