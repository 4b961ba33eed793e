//! Registry that launches, tracks, stops and enumerates tasks.

use super::handle::{Task, TaskOptions, WorkerSpawner, spawn_worker_thread};
use super::types::{StatusEntry, TaskId, TaskRecord, TaskStatus};
use crate::error::{OpsError, Result};
use crate::store::TaskStore;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Default number of fresh ids tried before `run` gives up.
pub const DEFAULT_ID_ALLOCATION_ATTEMPTS: u32 = 8;

/// A task launched by this process, with the sender that asks its watcher to stop it.
struct LiveTask {
    task: Task,
    stop_tx: Sender<()>,
    stop_requested: bool,
}

/// Creates tasks, keeps the live ones in memory and answers queries from the store.
///
/// `stop` only reaches tasks launched by this manager; the query methods and `list`
/// read the store and therefore also see records from earlier process lifetimes.
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    tasks: Mutex<HashMap<TaskId, LiveTask>>,
    id_attempts: u32,
    id_source: fn() -> TaskId,
    spawn_worker: WorkerSpawner,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            tasks: Mutex::new(HashMap::new()),
            id_attempts: DEFAULT_ID_ALLOCATION_ATTEMPTS,
            id_source: TaskId::random,
            spawn_worker: spawn_worker_thread,
        }
    }

    /// Set how many candidate ids `run` tries before failing.
    pub fn with_id_attempts(mut self, attempts: u32) -> Self {
        self.id_attempts = attempts.max(1);
        self
    }

    /// Replace the id generator.
    pub fn with_id_source(mut self, source: fn() -> TaskId) -> Self {
        self.id_source = source;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_worker_spawner(mut self, spawner: WorkerSpawner) -> Self {
        self.spawn_worker = spawner;
        self
    }

    /// Launch `work` as a new task.
    ///
    /// The task is registered and persisted as started, then `work` runs on its own
    /// thread. A watcher thread waits for whichever comes first: the task completing,
    /// or a `stop` request, which forces the task into `TimedOut`.
    ///
    /// # Arguments
    ///
    /// * `owner` - Who requested the work
    /// * `name` - What the work does
    /// * `options` - Tags and optional started/completed/status callbacks
    /// * `work` - The work function; it should finish by calling [`Task::done`]
    ///
    /// # Returns
    ///
    /// * `Ok(TaskId)` - The id of the running task
    /// * `Err(OpsError::IdGeneration)` - No unused id could be allocated
    /// * `Err(OpsError::Runtime)` - A thread could not be spawned
    pub fn run<F>(&self, owner: &str, name: &str, options: TaskOptions, work: F) -> Result<TaskId>
    where
        F: FnOnce(Task) + Send + 'static,
    {
        let task = {
            let mut tasks = self.tasks();
            let id = self.allocate_id(&tasks)?;
            let task = Task::new(id, owner, name, options, self.store.clone());

            let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
            spawn_watcher(&task, stop_rx)?;

            tasks.insert(
                id,
                LiveTask {
                    task: task.clone(),
                    stop_tx,
                    stop_requested: false,
                },
            );
            task
        };

        let id = task.id();
        if let Err(e) = task.start(work, self.spawn_worker) {
            // The caller never learns the id, so nothing could reach the entry
            self.remove_task(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Ask the watcher of a live task to force it into `TimedOut`.
    ///
    /// The work function is not interrupted; it keeps running, and its own later
    /// `done` call becomes a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The stop request was delivered
    /// * `Ok(false)` - The task had already completed, or a stop is already pending
    /// * `Err(OpsError::TaskNotFound)` - The id is not a live task of this manager
    pub fn stop(&self, id: &TaskId) -> Result<bool> {
        let mut tasks = self.tasks();
        let live = tasks.get_mut(id).ok_or_else(|| {
            error!("Failed to stop task: {}", id);
            OpsError::not_found(id)
        })?;

        if live.task.is_done() {
            debug!("Stop requested for completed task {}", id);
            return Ok(false);
        }
        if live.stop_requested {
            debug!("Stop already pending for task {}", id);
            return Ok(false);
        }

        match live.stop_tx.try_send(()) {
            Ok(()) => {
                live.stop_requested = true;
                info!("Stop requested for task {}", id);
                Ok(true)
            }
            Err(TrySendError::Full(())) => {
                debug!("Stop already pending for task {}", id);
                Ok(false)
            }
            Err(TrySendError::Disconnected(())) => {
                debug!("Watcher of task {} already exited", id);
                Ok(false)
            }
        }
    }

    /// Whether the persisted record is marked completed.
    pub fn is_done(&self, id: &TaskId) -> Result<bool> {
        Ok(self.get_task(id)?.completed)
    }

    /// Whether the persisted record is marked started.
    pub fn is_started(&self, id: &TaskId) -> Result<bool> {
        Ok(self.get_task(id)?.started)
    }

    /// The persisted status list, in append order.
    pub fn get_status(&self, id: &TaskId) -> Result<Vec<StatusEntry>> {
        Ok(self.get_task(id)?.status_list)
    }

    /// The persisted terminal outcome.
    pub fn get_outcome(&self, id: &TaskId) -> Result<TaskStatus> {
        Ok(self.get_task(id)?.status)
    }

    /// The full persisted record.
    pub fn get_task(&self, id: &TaskId) -> Result<TaskRecord> {
        self.store.find_by_id(id)?.ok_or_else(|| {
            error!("task id {} not found", id);
            OpsError::not_found(id)
        })
    }

    /// Ids of every persisted task record, live or not.
    pub fn list(&self) -> Result<Vec<TaskId>> {
        Ok(self.store.find_all()?.into_iter().map(|r| r.id).collect())
    }

    /// Live handle of a task launched by this manager.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks().get(id).map(|live| live.task.clone())
    }

    /// Number of tasks in the live table.
    pub fn live_count(&self) -> usize {
        self.tasks().len()
    }

    /// Drop the task from the live table and delete its persisted record.
    ///
    /// Fails with `TaskNotFound` only when the id is neither live nor persisted.
    pub fn remove(&self, id: &TaskId) -> Result<()> {
        let was_live = self.remove_task(id);
        match self.store.delete(id) {
            Ok(()) => {
                info!("Removed task {}", id);
                Ok(())
            }
            Err(OpsError::TaskNotFound { .. }) if was_live => {
                warn!("Task {} had no persisted record to remove", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the task from the live table only. Returns whether it was live.
    ///
    /// A removed task can no longer be stopped; its work function keeps running.
    pub fn remove_task(&self, id: &TaskId) -> bool {
        self.tasks().remove(id).is_some()
    }

    fn allocate_id(&self, live: &HashMap<TaskId, LiveTask>) -> Result<TaskId> {
        for _ in 0..self.id_attempts {
            let id = (self.id_source)();
            let persisted = match self.store.find_by_id(&id) {
                Ok(found) => found.is_some(),
                Err(e) => {
                    warn!("Could not check task id {} against the store: {}", id, e);
                    false
                }
            };
            if !live.contains_key(&id) && !persisted {
                return Ok(id);
            }
            warn!("Generated task id {} is already in use", id);
        }

        Err(OpsError::IdGeneration(format!(
            "no unused id after {} attempts",
            self.id_attempts
        )))
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, LiveTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Spawn the thread that races normal completion against a stop request.
fn spawn_watcher(task: &Task, stop_rx: Receiver<()>) -> Result<()> {
    let done_rx = task.completion_signal();
    let watched = task.clone();

    thread::Builder::new()
        .name(format!("task-watch-{}", task.id()))
        .spawn(move || {
            crossbeam_channel::select! {
                recv(done_rx) -> _ => {}
                recv(stop_rx) -> msg => {
                    // A disconnected stop channel means the task left the live table.
                    if msg.is_ok() {
                        let id = watched.id();
                        watched.force_timeout(format!(
                            "Force Stop. Task: {} explicitly stopped due to timeout.",
                            id
                        ));
                    }
                }
            }
        })
        .map(|_| ())
        .map_err(|e| {
            OpsError::Runtime(format!(
                "failed to spawn watcher for task {}: {}",
                task.id(),
                e
            ))
        })
}
