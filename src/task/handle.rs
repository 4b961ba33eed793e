//! The live task handle shared by a work function, its watcher and the manager.

use super::types::{StatusEntry, TaskId, TaskRecord, TaskStatus, TaskUpdate};
use crate::error::{OpsError, Result};
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Starts a worker body on a new named thread.
pub(super) type WorkerSpawner = fn(String, Box<dyn FnOnce() + Send + 'static>) -> io::Result<()>;

/// Callback invoked with the task when it starts or completes.
pub type TaskCallback = Arc<dyn Fn(&Task) + Send + Sync>;

/// Callback invoked for every accepted status entry.
pub type StatusCallback = Arc<dyn Fn(&Task, &StatusEntry) + Send + Sync>;

/// Launch-time options for a task: metadata tags and optional callbacks.
///
/// Every callback runs on its own detached thread and never blocks the task.
#[derive(Clone, Default)]
pub struct TaskOptions {
    pub tag: BTreeMap<String, String>,
    pub on_started: Option<TaskCallback>,
    pub on_completed: Option<TaskCallback>,
    pub on_status: Option<StatusCallback>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag.insert(key.into(), value.into());
        self
    }

    pub fn on_started(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.on_started = Some(Arc::new(f));
        self
    }

    pub fn on_completed(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }

    pub fn on_status(mut self, f: impl Fn(&Task, &StatusEntry) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("tag", &self.tag)
            .field("on_started", &self.on_started.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

/// Mutable task state. Every field is guarded by the one per-task mutex.
struct TaskState {
    started: bool,
    completed: bool,
    status: TaskStatus,
    status_list: Vec<StatusEntry>,
    sub_tasks: Vec<TaskId>,
    last_updated: DateTime<Utc>,
    /// Dropped exactly once, at the terminal transition, which closes the
    /// completion channel for every receiver.
    done_signal: Option<Sender<()>>,
}

struct TaskInner {
    id: TaskId,
    owner: String,
    name: String,
    tag: BTreeMap<String, String>,
    state: Mutex<TaskState>,
    done_rx: Receiver<()>,
    store: Arc<dyn TaskStore>,
    on_started: Option<TaskCallback>,
    on_completed: Option<TaskCallback>,
    on_status: Option<StatusCallback>,
}

/// A unit of asynchronous work with identity, status history and a terminal outcome.
///
/// `Task` is a cheap handle; clones refer to the same task. Handles are only
/// created by [`TaskManager::run`](super::TaskManager::run).
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub(super) fn new(
        id: TaskId,
        owner: &str,
        name: &str,
        options: TaskOptions,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::bounded(0);
        let TaskOptions {
            tag,
            on_started,
            on_completed,
            on_status,
        } = options;

        Self {
            inner: Arc::new(TaskInner {
                id,
                owner: owner.to_string(),
                name: name.to_string(),
                tag,
                state: Mutex::new(TaskState {
                    started: false,
                    completed: false,
                    status: TaskStatus::None,
                    status_list: Vec::new(),
                    sub_tasks: Vec::new(),
                    last_updated: Utc::now(),
                    done_signal: Some(done_tx),
                }),
                done_rx,
                store,
                on_started,
                on_completed,
                on_status,
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tag(&self) -> &BTreeMap<String, String> {
        &self.inner.tag
    }

    pub fn is_started(&self) -> bool {
        self.state().started
    }

    /// Terminal outcome; `TaskStatus::None` until the task completes.
    pub fn status(&self) -> TaskStatus {
        self.state().status
    }

    /// In-memory copy of the status list, in append order.
    pub fn status_list(&self) -> Vec<StatusEntry> {
        self.state().status_list.clone()
    }

    /// Non-blocking check of the completion signal.
    pub fn is_done(&self) -> bool {
        matches!(
            self.inner.done_rx.try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }

    /// Block until the task reaches a terminal state.
    pub fn wait(&self) {
        // Nothing is ever sent; recv returns once the channel closes.
        let _ = self.inner.done_rx.recv();
    }

    /// Block until the task completes or `timeout` elapses. Returns whether it completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }

    /// Append a timestamped status entry and persist the updated list.
    ///
    /// Dropped silently once the task is completed. A failed write is logged and
    /// leaves the in-memory list authoritative.
    pub fn update_status(&self, message: impl Into<String>) {
        if let Err(e) = self.append_status(message.into()) {
            error!(
                "Error updating status list for task: {}. error: {}",
                self.inner.id, e
            );
        }
    }

    /// Record the terminal outcome. The first call wins; later calls are no-ops.
    ///
    /// Returns whether this call performed the transition.
    pub fn done(&self, status: TaskStatus) -> bool {
        self.finish(status, None)
    }

    /// Link `child` under this task in the store.
    ///
    /// Sets the child's `parentid` and appends it to this task's `subtasks`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Both records updated
    /// * `Err(OpsError::TaskNotFound)` - Either record is missing from the store
    /// * `Err(OpsError::StoreError)` - The store failed
    pub fn add_sub_task(&self, child: TaskId) -> Result<()> {
        let id = self.inner.id;
        let mut state = self.state();

        if self.inner.store.find_by_id(&id)?.is_none() {
            error!("Unable to get task: {}", id);
            return Err(OpsError::not_found(id));
        }
        self.inner.store.update(&child, &TaskUpdate::parent(id))?;

        state.sub_tasks.push(child);
        self.inner
            .store
            .update(&id, &TaskUpdate::sub_tasks(state.sub_tasks.clone()))?;
        debug!("Task {} now has sub task {}", id, child);
        Ok(())
    }

    /// Mark the task started, persist it, fire the started callback and launch
    /// `work` on its own thread.
    pub(super) fn start<F>(&self, work: F, spawn_worker: WorkerSpawner) -> Result<()>
    where
        F: FnOnce(Task) + Send + 'static,
    {
        {
            let mut state = self.state();
            state.started = true;
            state.last_updated = Utc::now();
            let record = self.record_from(&state);
            if let Err(e) = self.inner.store.insert(&record) {
                error!("Error persisting task: {}. error: {}", self.inner.id, e);
            }
        }

        if let Some(callback) = self.inner.on_started.clone() {
            let task = self.clone();
            spawn_detached(format!("task-started-{}", self.inner.id), move || {
                callback(&task)
            });
        }

        let task = self.clone();
        let spawned = spawn_worker(
            format!("task-{}", self.inner.id),
            Box::new(move || run_work(task, work)),
        );

        if let Err(e) = spawned {
            let message = format!("Failed to start worker for task {}: {}", self.inner.id, e);
            error!("{}", message);
            self.finish(TaskStatus::Failure, Some(message.clone()));
            return Err(OpsError::Runtime(message));
        }

        info!("Started {}", self);
        Ok(())
    }

    /// Receiver that disconnects when the task completes.
    pub(super) fn completion_signal(&self) -> Receiver<()> {
        self.inner.done_rx.clone()
    }

    /// Force the task into `TimedOut`, recording why in the same critical section.
    pub(super) fn force_timeout(&self, message: String) -> bool {
        self.finish(TaskStatus::TimedOut, Some(message))
    }

    fn append_status(&self, message: String) -> Result<()> {
        let id = self.inner.id;
        let mut state = self.state();
        if state.completed {
            debug!("Dropping status for completed task {}: {}", id, message);
            return Ok(());
        }

        let entry = next_entry(&state, message);
        state.last_updated = entry.timestamp;
        state.status_list.push(entry.clone());
        let persisted = self.inner.store.update(
            &id,
            &TaskUpdate::status_list(state.status_list.clone(), state.last_updated),
        );
        drop(state);

        if let Some(callback) = self.inner.on_status.clone() {
            let task = self.clone();
            spawn_detached(format!("task-status-{}", id), move || {
                callback(&task, &entry)
            });
        }

        persisted
    }

    /// The single terminal transition: status, flag and persisted write happen under
    /// the task mutex, then the completion channel is closed.
    fn finish(&self, status: TaskStatus, final_message: Option<String>) -> bool {
        let id = self.inner.id;
        let mut final_entry = None;
        {
            let mut state = self.state();
            if state.completed {
                warn!("Task: {} already in closed state. May be timed-out.", id);
                return false;
            }

            if let Some(message) = final_message {
                let entry = next_entry(&state, message);
                state.last_updated = entry.timestamp;
                state.status_list.push(entry.clone());
                final_entry = Some(entry);
                if let Err(e) = self.inner.store.update(
                    &id,
                    &TaskUpdate::status_list(state.status_list.clone(), state.last_updated),
                ) {
                    error!("Error updating status list for task: {}. error: {}", id, e);
                }
            }

            state.completed = true;
            state.status = status;
            state.last_updated = Utc::now().max(state.last_updated);
            if let Err(e) = self
                .inner
                .store
                .update(&id, &TaskUpdate::completion(status, state.last_updated))
            {
                error!("Error updating status of task: {}. error: {}", id, e);
            }

            state.done_signal.take();
        }

        info!("Task {} completed with status {}", id, status);

        if let (Some(entry), Some(callback)) = (final_entry, self.inner.on_status.clone()) {
            let task = self.clone();
            spawn_detached(format!("task-status-{}", id), move || {
                callback(&task, &entry)
            });
        }
        if let Some(callback) = self.inner.on_completed.clone() {
            let task = self.clone();
            spawn_detached(format!("task-completed-{}", id), move || callback(&task));
        }
        true
    }

    fn state(&self) -> MutexGuard<'_, TaskState> {
        // State is only mutated in whole steps, so a poisoned guard is still consistent.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn record_from(&self, state: &TaskState) -> TaskRecord {
        TaskRecord {
            id: self.inner.id,
            name: self.inner.name.clone(),
            owner: self.inner.owner.clone(),
            parent_id: None,
            started: state.started,
            completed: state.completed,
            status_list: state.status_list.clone(),
            tag: self.inner.tag.clone(),
            last_updated: state.last_updated,
            sub_tasks: state.sub_tasks.clone(),
            status: state.status,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        write!(
            f,
            "Task{{Owner={},ID={}, Name={}, Started={}, Completed={}}}",
            self.inner.owner, self.inner.id, self.inner.name, state.started, state.completed
        )
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("owner", &self.inner.owner)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

/// Build the next status entry, never earlier than the previous one.
fn next_entry(state: &TaskState, message: String) -> StatusEntry {
    let mut entry = StatusEntry::now(message);
    if let Some(last) = state.status_list.last()
        && entry.timestamp < last.timestamp
    {
        entry.timestamp = last.timestamp;
    }
    entry
}

/// Worker thread body. A panicking work function fails its task instead of leaving
/// it running forever.
fn run_work<F>(task: Task, work: F)
where
    F: FnOnce(Task),
{
    let handle = task.clone();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || work(handle))) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Work function of task {} panicked: {}", task.id(), reason);
        task.finish(
            TaskStatus::Failure,
            Some(format!("Task aborted: work function panicked: {}", reason)),
        );
    }
}

/// Default [`WorkerSpawner`]: a detached OS thread.
pub(super) fn spawn_worker_thread(
    name: String,
    body: Box<dyn FnOnce() + Send + 'static>,
) -> io::Result<()> {
    thread::Builder::new().name(name).spawn(body).map(|_| ())
}

/// Run `f` on a named detached thread; a spawn failure is logged and dropped.
fn spawn_detached(name: String, f: impl FnOnce() + Send + 'static) {
    if let Err(e) = thread::Builder::new().name(name.clone()).spawn(f) {
        error!("Failed to spawn thread {}: {}", name, e);
    }
}
