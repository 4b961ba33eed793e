//! Advisory entity locks.
//!
//! Before mutating managed entities (nodes, clusters, storage pools) a caller
//! describes them in an [`AppLock`] and asks the [`LockManager`] for all of them
//! at once. Acquisition is all-or-nothing and fail-fast: if any entity is already
//! held the call returns a `LockConflict` naming it and creates no entries. There
//! is no waiting and no deadlock detection; callers that need eventual access
//! retry on their own schedule.
//!
//! # Advisory Only
//!
//! Nothing stops code from touching an entity without consulting the table. The
//! lock table is process-local and shares nothing with the task engine; callers
//! release an AppLock once the task working on those entities has completed.
//!
//! # RAII Guards
//!
//! [`LockManager::acquire_guard`] returns a [`LockGuard`] that releases the
//! AppLock when dropped.

mod app_lock;
mod guard;
mod manager;
mod metadata;


// Re-export public API
pub use app_lock::{AppLock, EntityId};
pub use guard::LockGuard;
pub use manager::LockManager;
pub use metadata::{LockInfo, LockRecord};
