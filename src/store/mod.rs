//! Persistence adapter for task records.
//!
//! The task engine talks to its document store only through [`TaskStore`]: insert a
//! record, find one by id, update selected fields by id, delete by id, and list all
//! records. Nothing here is transactional across documents.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: a mutex-guarded map, for tests and throwaway processes
//! - [`FileStore`]: one JSON document per task under a collection directory

mod file;
mod memory;


use crate::error::Result;
use crate::task::{TaskId, TaskRecord, TaskUpdate};

pub use file::FileStore;
pub use memory::MemoryStore;

/// CRUD access to the task collection.
///
/// Implementations must be safe to call from many threads at once and must not
/// corrupt a record under concurrent writes to it; last writer wins.
pub trait TaskStore: Send + Sync {
    /// Insert a new record. Fails with `StoreError` if the id already exists.
    fn insert(&self, record: &TaskRecord) -> Result<()>;

    /// Look up a record by id.
    fn find_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>>;

    /// Apply `update` to the stored record. Fails with `TaskNotFound` if it is missing.
    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<()>;

    /// Delete a record. Fails with `TaskNotFound` if it is missing.
    fn delete(&self, id: &TaskId) -> Result<()>;

    /// Every stored record, ordered by id.
    fn find_all(&self) -> Result<Vec<TaskRecord>>;
}
