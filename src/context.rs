//! Service context wiring for clusterops.
//!
//! A [`ServiceContext`] is the single place where the configured store backend,
//! the task manager and the lock manager are built. The CLI resolves one per
//! invocation; embedding services build one at startup and share it.
//!
//! Locks are process-local, so a fresh context starts with an empty lock table.
//! When `clear_locks_on_startup` is set the table is cleared explicitly as well,
//! which matters for a context built around an existing [`LockManager`].

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::locks::LockManager;
use crate::store::{FileStore, MemoryStore, TaskStore};
use crate::task::TaskManager;
use log::{debug, info};
use std::sync::Arc;

/// Shared handles for the task engine and lock table.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Config,
    pub tasks: Arc<TaskManager>,
    pub locks: Arc<LockManager>,
}

impl ServiceContext {
    /// Build the store, task manager and a new lock manager from `config`.
    ///
    /// # Returns
    ///
    /// * `Ok(ServiceContext)` - Ready to run tasks
    /// * `Err(OpsError::StoreError)` - The file store directory could not be created
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_locks(config, Arc::new(LockManager::new()))
    }

    /// Like [`from_config`](Self::from_config), reusing an existing lock table.
    pub fn with_locks(config: &Config, locks: Arc<LockManager>) -> Result<Self> {
        let store = open_store(config)?;
        let tasks = TaskManager::new(store).with_id_attempts(config.id_allocation_attempts);

        if config.clear_locks_on_startup {
            let cleared = locks.clear();
            debug!("Lock table reset on startup ({} entries dropped)", cleared);
        }

        Ok(Self {
            config: config.clone(),
            tasks: Arc::new(tasks),
            locks,
        })
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn TaskStore>> {
    match config.store_backend {
        StoreBackend::File => {
            let dir = config.tasks_dir();
            info!("Using file store at {}", dir.display());
            Ok(Arc::new(FileStore::open(dir)?))
        }
        StoreBackend::Memory => {
            info!("Using in-memory task store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
