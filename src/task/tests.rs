//! Tests for the task engine.

use super::*;
use crate::error::OpsError;
use crate::store::{FileStore, MemoryStore, TaskStore};
use crate::test_support::memory_manager;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

fn wait_for(manager: &TaskManager, id: &TaskId) -> Task {
    let task = manager.get(id).expect("task should be live");
    assert!(task.wait_timeout(WAIT), "task {} did not complete", id);
    task
}

/// A work function that blocks until released, then reports whether its own
/// `done(Success)` took effect.
fn gated_work(release: Receiver<()>, result: Sender<bool>) -> impl FnOnce(Task) + Send + 'static {
    move |task: Task| {
        task.update_status("waiting for node");
        let _ = release.recv_timeout(WAIT);
        task.update_status("late status from worker");
        let _ = result.send(task.done(TaskStatus::Success));
    }
}

#[test]
fn test_three_updates_then_success() {
    let (manager, _store) = memory_manager();

    let id = manager
        .run("admin", "install node", TaskOptions::new(), |task| {
            task.update_status("Started installing packages");
            task.update_status("Configuring services");
            task.update_status("Installation complete");
            task.done(TaskStatus::Success);
        })
        .unwrap();

    wait_for(&manager, &id);

    let status = manager.get_status(&id).unwrap();
    let messages: Vec<&str> = status.iter().map(|s| s.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Started installing packages",
            "Configuring services",
            "Installation complete"
        ]
    );
    assert!(manager.is_done(&id).unwrap());
    assert!(manager.is_started(&id).unwrap());
    assert_eq!(manager.get_outcome(&id).unwrap(), TaskStatus::Success);
}

#[test]
fn test_done_is_idempotent() {
    let (manager, _store) = memory_manager();
    let (tx, rx) = unbounded();

    let id = manager
        .run("admin", "expand cluster", TaskOptions::new(), move |task| {
            let first = task.done(TaskStatus::Failure);
            let second = task.done(TaskStatus::Success);
            tx.send((first, second)).unwrap();
        })
        .unwrap();

    let (first, second) = rx.recv_timeout(WAIT).unwrap();
    assert!(first);
    assert!(!second);

    let task = wait_for(&manager, &id);
    assert_eq!(task.status(), TaskStatus::Failure);
    assert_eq!(manager.get_outcome(&id).unwrap(), TaskStatus::Failure);
}

#[test]
fn test_status_after_done_is_dropped() {
    let (manager, _store) = memory_manager();

    let id = manager
        .run("admin", "create pool", TaskOptions::new(), |task| {
            task.update_status("pool created");
            task.done(TaskStatus::Success);
            task.update_status("this must not appear");
        })
        .unwrap();

    let task = wait_for(&manager, &id);
    // Give the worker time to issue its late update
    thread::sleep(Duration::from_millis(50));

    assert_eq!(task.status_list().len(), 1);
    assert_eq!(manager.get_status(&id).unwrap().len(), 1);
}

#[test]
fn test_stop_forces_timed_out() {
    let (manager, _store) = memory_manager();
    let (release_tx, release_rx) = unbounded();
    let (result_tx, result_rx) = unbounded();

    let id = manager
        .run(
            "admin",
            "install node",
            TaskOptions::new(),
            gated_work(release_rx, result_tx),
        )
        .unwrap();

    assert!(manager.stop(&id).unwrap());
    let task = wait_for(&manager, &id);
    assert_eq!(task.status(), TaskStatus::TimedOut);
    assert_eq!(manager.get_outcome(&id).unwrap(), TaskStatus::TimedOut);

    // The worker keeps running; its own done is a no-op.
    release_tx.send(()).unwrap();
    let worker_won = result_rx.recv_timeout(WAIT).unwrap();
    assert!(!worker_won);
    assert_eq!(manager.get_outcome(&id).unwrap(), TaskStatus::TimedOut);

    let status = manager.get_status(&id).unwrap();
    let last = status.last().unwrap();
    assert!(last.message.starts_with("Force Stop. Task:"));
    assert!(!status.iter().any(|s| s.message == "late status from worker"));
}

#[test]
fn test_stop_after_done_is_noop() {
    let (manager, _store) = memory_manager();

    let id = manager
        .run("admin", "quick", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);

    assert!(!manager.stop(&id).unwrap());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(manager.get_outcome(&id).unwrap(), TaskStatus::Success);
    assert!(
        !manager
            .get_status(&id)
            .unwrap()
            .iter()
            .any(|s| s.message.starts_with("Force Stop"))
    );
}

#[test]
fn test_second_stop_is_not_delivered_again() {
    let (manager, _store) = memory_manager();
    let (release_tx, release_rx) = unbounded();
    let (result_tx, _result_rx) = unbounded();

    let id = manager
        .run(
            "admin",
            "slow",
            TaskOptions::new(),
            gated_work(release_rx, result_tx),
        )
        .unwrap();

    assert!(manager.stop(&id).unwrap());
    assert!(!manager.stop(&id).unwrap());

    wait_for(&manager, &id);
    release_tx.send(()).unwrap();
    let timeouts = manager
        .get_status(&id)
        .unwrap()
        .iter()
        .filter(|s| s.message.starts_with("Force Stop"))
        .count();
    assert_eq!(timeouts, 1);
}

#[test]
fn test_stop_unknown_task_is_not_found() {
    let (manager, _store) = memory_manager();

    let err = manager.stop(&TaskId::random()).unwrap_err();
    assert!(matches!(err, OpsError::TaskNotFound { .. }));
}

#[test]
fn test_queries_on_unknown_task_fail() {
    let (manager, _store) = memory_manager();
    let id = TaskId::random();

    assert!(matches!(
        manager.is_done(&id),
        Err(OpsError::TaskNotFound { .. })
    ));
    assert!(matches!(
        manager.is_started(&id),
        Err(OpsError::TaskNotFound { .. })
    ));
    assert!(matches!(
        manager.get_status(&id),
        Err(OpsError::TaskNotFound { .. })
    ));
}

#[test]
fn test_list_reports_persisted_tasks_but_stop_only_live_ones() {
    let (manager, store) = memory_manager();

    let old = TaskRecord {
        id: TaskId::random(),
        name: "from a previous run".to_string(),
        owner: "admin".to_string(),
        parent_id: None,
        started: true,
        completed: false,
        status_list: Vec::new(),
        tag: BTreeMap::new(),
        last_updated: Utc::now(),
        sub_tasks: Vec::new(),
        status: TaskStatus::None,
    };
    store.insert(&old).unwrap();

    let id = manager
        .run("admin", "current", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);

    let ids = manager.list().unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&old.id));
    assert!(ids.contains(&id));

    assert!(!manager.is_done(&old.id).unwrap());
    assert!(matches!(
        manager.stop(&old.id),
        Err(OpsError::TaskNotFound { .. })
    ));
}

#[test]
fn test_remove_and_remove_task() {
    let (manager, store) = memory_manager();

    let first = manager
        .run("admin", "first", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    let second = manager
        .run("admin", "second", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &first);
    wait_for(&manager, &second);
    assert_eq!(manager.live_count(), 2);

    // remove_task forgets the live handle but keeps the record
    assert!(manager.remove_task(&first));
    assert!(!manager.remove_task(&first));
    assert!(manager.get(&first).is_none());
    assert!(store.find_by_id(&first).unwrap().is_some());
    assert!(matches!(
        manager.stop(&first),
        Err(OpsError::TaskNotFound { .. })
    ));

    // remove drops both
    manager.remove(&second).unwrap();
    assert!(manager.get(&second).is_none());
    assert!(store.find_by_id(&second).unwrap().is_none());
    assert_eq!(manager.live_count(), 0);

    // first is still persisted, so remove succeeds from the store alone
    manager.remove(&first).unwrap();
    assert!(store.is_empty());

    assert!(matches!(
        manager.remove(&first),
        Err(OpsError::TaskNotFound { .. })
    ));
}

#[test]
fn test_callbacks_fire_on_their_own_threads() {
    let (manager, _store) = memory_manager();
    let (started_tx, started_rx) = unbounded();
    let (completed_tx, completed_rx) = unbounded();
    let status_count = Arc::new(AtomicUsize::new(0));
    let counter = status_count.clone();

    let options = TaskOptions::new()
        .on_started(move |task| started_tx.send(task.id()).unwrap())
        .on_completed(move |task| completed_tx.send((task.id(), task.status())).unwrap())
        .on_status(move |_task, _entry| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let id = manager
        .run("admin", "callbacks", options, |task| {
            task.update_status("one");
            task.update_status("two");
            task.done(TaskStatus::Success);
        })
        .unwrap();

    assert_eq!(started_rx.recv_timeout(WAIT).unwrap(), id);
    assert_eq!(
        completed_rx.recv_timeout(WAIT).unwrap(),
        (id, TaskStatus::Success)
    );
    // Completed fires once
    assert!(completed_rx.recv_timeout(Duration::from_millis(50)).is_err());

    for _ in 0..100 {
        if status_count.load(Ordering::SeqCst) == 2 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(status_count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_panicking_work_fails_the_task() {
    let (manager, _store) = memory_manager();

    let id = manager
        .run("admin", "doomed", TaskOptions::new(), |task| {
            task.update_status("about to fail");
            panic!("disk exploded");
        })
        .unwrap();

    let task = wait_for(&manager, &id);
    assert_eq!(task.status(), TaskStatus::Failure);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.len(), 2);
    assert!(status[1].message.contains("disk exploded"));
}

#[test]
fn test_sequential_updates_are_neither_lost_nor_duplicated() {
    let (manager, _store) = memory_manager();

    let id = manager
        .run("admin", "many updates", TaskOptions::new(), |task| {
            for i in 0..50 {
                task.update_status(format!("step {}", i));
            }
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.len(), 50);
    for (i, entry) in status.iter().enumerate() {
        assert_eq!(entry.message, format!("step {}", i));
    }
    assert!(
        status
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );
}

#[test]
fn test_concurrent_updates_racing_done() {
    let (manager, _store) = memory_manager();
    let (handle_tx, handle_rx) = unbounded();

    let id = manager
        .run("admin", "racy", TaskOptions::new(), move |task| {
            handle_tx.send(task).unwrap();
        })
        .unwrap();
    let task: Task = handle_rx.recv_timeout(WAIT).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let task = task.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    task.update_status(format!("writer {} step {}", w, i));
                }
            })
        })
        .collect();
    let finisher = {
        let task = task.clone();
        thread::spawn(move || task.done(TaskStatus::Success))
    };

    for writer in writers {
        writer.join().unwrap();
    }
    assert!(finisher.join().unwrap());

    let persisted = manager.get_status(&id).unwrap();
    let in_memory = task.status_list();
    assert_eq!(persisted, in_memory);
    assert!(persisted.len() <= 100);
    assert!(manager.is_done(&id).unwrap());

    // Nothing sneaks in after completion
    task.update_status("after the fact");
    assert_eq!(manager.get_status(&id).unwrap().len(), persisted.len());
}

#[test]
fn test_add_sub_task_links_both_records() {
    let (manager, store) = memory_manager();
    let (release_tx, release_rx) = unbounded::<()>();

    let parent_id = manager
        .run("admin", "parent", TaskOptions::new(), move |task| {
            let _ = release_rx.recv_timeout(WAIT);
            task.done(TaskStatus::Success);
        })
        .unwrap();
    let child_id = manager
        .run("admin", "child", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &child_id);

    let parent = manager.get(&parent_id).unwrap();
    parent.add_sub_task(child_id).unwrap();

    let child_record = store.find_by_id(&child_id).unwrap().unwrap();
    assert_eq!(child_record.parent_id, Some(parent_id));
    assert_eq!(
        manager.get_task(&child_id).unwrap().parent_id,
        Some(parent_id)
    );
    let parent_record = store.find_by_id(&parent_id).unwrap().unwrap();
    assert_eq!(parent_record.sub_tasks, vec![child_id]);

    // Unknown child leaves the parent untouched
    let err = parent.add_sub_task(TaskId::random()).unwrap_err();
    assert!(matches!(err, OpsError::TaskNotFound { .. }));
    let parent_record = store.find_by_id(&parent_id).unwrap().unwrap();
    assert_eq!(parent_record.sub_tasks, vec![child_id]);

    release_tx.send(()).unwrap();
    wait_for(&manager, &parent_id);
}

#[test]
fn test_add_sub_task_fails_when_parent_record_is_gone() {
    let (manager, store) = memory_manager();
    let (release_tx, release_rx) = unbounded::<()>();

    let parent_id = manager
        .run("admin", "parent", TaskOptions::new(), move |task| {
            let _ = release_rx.recv_timeout(WAIT);
            task.done(TaskStatus::Success);
        })
        .unwrap();
    let child_id = manager
        .run("admin", "child", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &child_id);

    let parent = manager.get(&parent_id).unwrap();
    store.delete(&parent_id).unwrap();

    let err = parent.add_sub_task(child_id).unwrap_err();
    assert!(matches!(err, OpsError::TaskNotFound { .. }));
    assert_eq!(
        store.find_by_id(&child_id).unwrap().unwrap().parent_id,
        None
    );

    release_tx.send(()).unwrap();
}

fn fixed_id() -> TaskId {
    TaskId::from(Uuid::from_u128(42))
}

#[test]
fn test_id_generation_failure() {
    let store = Arc::new(MemoryStore::new());
    let manager = TaskManager::new(store)
        .with_id_source(fixed_id)
        .with_id_attempts(3);

    let id = manager
        .run("admin", "first", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    assert_eq!(id, fixed_id());

    let err = manager
        .run("admin", "second", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap_err();
    assert!(matches!(err, OpsError::IdGeneration(_)));
    assert_eq!(manager.live_count(), 1);
}

#[test]
fn test_tags_are_persisted() {
    let (manager, _store) = memory_manager();
    let options = TaskOptions::new()
        .with_tag("cluster", "ceph-prod")
        .with_tag("node", "osd-3");

    let id = manager
        .run("admin", "tagged", options, |task| {
            assert_eq!(task.tag().get("cluster").unwrap(), "ceph-prod");
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);

    let record = manager.get_task(&id).unwrap();
    assert_eq!(record.tag.len(), 2);
    assert_eq!(record.tag["node"], "osd-3");
    assert_eq!(record.owner, "admin");
    assert_eq!(record.name, "tagged");
}

#[test]
fn test_task_display() {
    let (manager, _store) = memory_manager();
    let (release_tx, release_rx) = unbounded::<()>();

    let id = manager
        .run("admin", "display me", TaskOptions::new(), move |task| {
            let _ = release_rx.recv_timeout(WAIT);
            task.done(TaskStatus::Success);
        })
        .unwrap();
    let task = manager.get(&id).unwrap();

    let shown = task.to_string();
    assert_eq!(
        shown,
        format!(
            "Task{{Owner=admin,ID={}, Name=display me, Started=true, Completed=false}}",
            id
        )
    );
    release_tx.send(()).unwrap();
    wait_for(&manager, &id);
}

#[test]
fn test_task_status_strings() {
    assert_eq!(TaskStatus::None.to_string(), "none");
    assert_eq!(TaskStatus::Success.to_string(), "success");
    assert_eq!(TaskStatus::TimedOut.to_string(), "timedout");
    assert_eq!(TaskStatus::Failure.to_string(), "failed");
    assert_eq!(
        serde_json::to_string(&TaskStatus::TimedOut).unwrap(),
        "\"timedout\""
    );
}

#[test]
fn test_task_id_parsing() {
    let id = TaskId::random();
    let parsed: TaskId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);

    let err = "not-a-uuid".parse::<TaskId>().unwrap_err();
    assert!(matches!(err, OpsError::UserError(_)));
}

#[test]
fn test_file_store_records_survive_the_manager() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(FileStore::open(temp_dir.path()).unwrap());
    let manager = TaskManager::new(store);

    let id = manager
        .run("admin", "persisted", TaskOptions::new(), |task| {
            task.update_status("written to disk");
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);
    drop(manager);

    let reopened = TaskManager::new(Arc::new(FileStore::open(temp_dir.path()).unwrap()));
    assert_eq!(reopened.list().unwrap(), vec![id]);
    assert!(reopened.is_done(&id).unwrap());
    assert_eq!(reopened.get_status(&id).unwrap()[0].message, "written to disk");
    assert!(matches!(
        reopened.stop(&id),
        Err(OpsError::TaskNotFound { .. })
    ));
}

fn refuse_worker(_name: String, _body: Box<dyn FnOnce() + Send + 'static>) -> std::io::Result<()> {
    Err(std::io::Error::other("thread limit reached"))
}

#[test]
fn test_worker_spawn_failure_leaves_no_live_entry() {
    let store = Arc::new(MemoryStore::new());
    let manager = TaskManager::new(store.clone()).with_worker_spawner(refuse_worker);

    let err = manager
        .run("admin", "never runs", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap_err();
    assert!(matches!(err, OpsError::Runtime(_)));
    assert_eq!(manager.live_count(), 0);

    // The record is kept and finalized as failed
    let records = store.find_all().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].completed);
    assert_eq!(records[0].status, TaskStatus::Failure);
    assert!(
        records[0].status_list[0]
            .message
            .starts_with("Failed to start worker")
    );
}

/// A store whose lookups fail while writes go through.
struct BlindStore {
    inner: MemoryStore,
}

impl TaskStore for BlindStore {
    fn insert(&self, record: &TaskRecord) -> crate::error::Result<()> {
        self.inner.insert(record)
    }

    fn find_by_id(&self, _id: &TaskId) -> crate::error::Result<Option<TaskRecord>> {
        Err(OpsError::StoreError("lookup unavailable".to_string()))
    }

    fn update(&self, id: &TaskId, update: &TaskUpdate) -> crate::error::Result<()> {
        self.inner.update(id, update)
    }

    fn delete(&self, id: &TaskId) -> crate::error::Result<()> {
        self.inner.delete(id)
    }

    fn find_all(&self) -> crate::error::Result<Vec<TaskRecord>> {
        self.inner.find_all()
    }
}

#[test]
fn test_store_lookup_failure_does_not_block_id_allocation() {
    let store = Arc::new(BlindStore {
        inner: MemoryStore::new(),
    });
    let manager = TaskManager::new(store.clone());

    let id = manager
        .run("admin", "install node", TaskOptions::new(), |task| {
            task.done(TaskStatus::Success);
        })
        .unwrap();
    wait_for(&manager, &id);

    let records = store.find_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].status, TaskStatus::Success);
}
