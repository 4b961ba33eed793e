//! Implementation of the `clusterops exec` command.
//!
//! Runs an external command as a tracked task. Output lines become status
//! entries, the requested entities stay locked until the task completes, and an
//! optional timeout stops the task through the task manager.

use crate::cli::ExecArgs;
use crate::context::ServiceContext;
use crate::error::{OpsError, Result};
use crate::locks::{AppLock, EntityId};
use crate::task::{Task, TaskOptions, TaskStatus};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the worker checks the child process and the task state.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the worker to reap the child once the task is done.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Execute the `clusterops exec` command.
///
/// # Returns
///
/// * `Ok(())` - The command exited successfully
/// * `Err(OpsError::LockConflict)` - A requested entity is already locked; nothing ran
/// * `Err(OpsError::TaskFailed)` - The command failed or was stopped by the timeout
pub fn cmd_exec(ctx: &ServiceContext, args: ExecArgs) -> Result<()> {
    let display = shell_words::join(&args.command);
    let name = args.name.clone().unwrap_or_else(|| display.clone());
    let owner = args.owner.clone().unwrap_or_else(actor_string);
    let tags = parse_pairs(&args.tags, "--tag")?;
    let app_lock = parse_locks(&args.locks)?;
    let timeout_secs = args.timeout_secs.unwrap_or(ctx.config.exec_timeout_secs);

    let lock_ctx = format!("exec {}", name);
    let guard = ctx.locks.acquire_guard(&lock_ctx, app_lock)?;

    let mut options = TaskOptions::new();
    for (key, value) in tags {
        options = options.with_tag(key, value);
    }

    let (reaped_tx, reaped_rx) = crossbeam_channel::bounded(1);
    let command = args.command;
    let id = ctx.tasks.run(&owner, &name, options, move |task| {
        run_command(task, command, reaped_tx)
    })?;
    info!("Started task {} for: {}", id, display);
    println!("Started task {}", id);

    let task = ctx.tasks.get(&id).ok_or_else(|| OpsError::not_found(id))?;
    if timeout_secs > 0 && !task.wait_timeout(Duration::from_secs(timeout_secs)) {
        warn!("Task {} exceeded {}s, stopping it", id, timeout_secs);
        ctx.tasks.stop(&id)?;
    }
    task.wait();

    if reaped_rx.recv_timeout(REAP_GRACE).is_err() {
        warn!("Command of task {} did not exit after completion", id);
    }
    guard.release();

    let status = task.status();
    println!("Task {} finished: {}", id, status);
    if status == TaskStatus::Success {
        Ok(())
    } else {
        Err(OpsError::TaskFailed {
            id: id.to_string(),
            status: status.to_string(),
        })
    }
}

/// Work function: run the command, then complete the task from its exit status.
fn run_command(task: Task, command: Vec<String>, reaped: Sender<()>) {
    let status = match execute(&task, &command) {
        Ok(status) => status,
        Err(e) => {
            task.update_status(e.to_string());
            TaskStatus::Failure
        }
    };

    if !task.done(status) {
        debug!("Task {} was already completed before the command exited", task.id());
    }
    let _ = reaped.send(());
}

fn execute(task: &Task, command: &[String]) -> Result<TaskStatus> {
    let (program, rest) = command
        .split_first()
        .ok_or_else(|| OpsError::UserError("no command given".to_string()))?;

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            OpsError::UserError(format!(
                "failed to execute command '{}': {}\n\
                 Fix: ensure the command is installed and in PATH.",
                program, e
            ))
        })?;

    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.extend(forward_lines(task, stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.extend(forward_lines(task, stderr));
    }

    let exit = wait_or_abandon(task, &mut child);
    for reader in readers {
        let _ = reader.join();
    }

    match exit? {
        Some(status) if status.success() => Ok(TaskStatus::Success),
        Some(status) => {
            task.update_status(format!("Command exited with {}", status));
            Ok(TaskStatus::Failure)
        }
        // Forced completion; the outcome is already recorded
        None => Ok(task.status()),
    }
}

/// Wait for the child to exit, killing it if the task completes first.
///
/// Returns `None` when the child was killed.
fn wait_or_abandon(task: &Task, child: &mut Child) -> Result<Option<std::process::ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                return Err(OpsError::Runtime(format!(
                    "failed to wait for command: {}",
                    e
                )));
            }
        }

        if task.is_done() {
            info!("Task {} completed while its command was running, killing it", task.id());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Echo each line of `stream` and record it as a status entry.
fn forward_lines<R: Read + Send + 'static>(task: &Task, stream: R) -> Option<JoinHandle<()>> {
    let id = task.id();
    let task = task.clone();
    thread::Builder::new()
        .name(format!("task-output-{}", id))
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) => {
                        println!("{}", line);
                        task.update_status(line);
                    }
                    Err(e) => {
                        debug!("Stopped reading output of task {}: {}", task.id(), e);
                        break;
                    }
                }
            }
        })
        .map_err(|e| warn!("Failed to capture output of task {}: {}", id, e))
        .ok()
}

/// Parse `KEY=VALUE` arguments.
pub(super) fn parse_pairs(raw: &[String], flag: &str) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(OpsError::UserError(format!(
                "invalid {} '{}': expected KEY=VALUE",
                flag, item
            ))),
        })
        .collect()
}

/// Parse `ENTITY=REASON` arguments into an AppLock.
pub(super) fn parse_locks(raw: &[String]) -> Result<AppLock> {
    parse_pairs(raw, "--lock")?
        .into_iter()
        .map(|(entity, reason)| {
            let entity: EntityId = entity.parse().map_err(|e| {
                OpsError::UserError(format!("invalid lock entity '{}': {}", entity, e))
            })?;
            Ok((entity, reason))
        })
        .collect::<Result<Vec<_>>>()
        .map(AppLock::new)
}

/// Default task owner: `user@host`.
fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
