//! Asynchronous task execution engine.
//!
//! A [`Task`] is one detached unit of work: it has an identity, an append-only
//! status list and exactly one terminal outcome. The [`TaskManager`] launches
//! tasks, keeps the live ones reachable for `stop`, and answers queries from the
//! persisted records in the [`TaskStore`](crate::store::TaskStore).
//!
//! # Threads
//!
//! Each launched task owns two threads:
//! - the worker, running the caller's work function
//! - the watcher, waiting for either completion or a stop request
//!
//! Started, completed and status callbacks each run on a further detached thread.
//!
//! # Terminal Transition
//!
//! The worker's `done` and the watcher's forced timeout race for the single
//! terminal transition. Both go through the per-task mutex; the first one sets
//! `completed`, records the status, persists it and closes the completion
//! channel. The loser observes `completed` and does nothing.
//!
//! ```text
//! Created -> Started -> Running -> Success | Failure | TimedOut
//! ```

mod handle;
mod manager;
mod types;

#[cfg(test)]
mod tests;

pub use handle::{StatusCallback, Task, TaskCallback, TaskOptions};
pub use manager::{DEFAULT_ID_ALLOCATION_ATTEMPTS, TaskManager};
pub use types::{StatusEntry, TaskId, TaskRecord, TaskStatus, TaskUpdate};
