//! Task identity, status and persisted record definitions.

use crate::error::{OpsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a random (v4) identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| OpsError::UserError(format!("invalid task id '{}': {}", s, e)))
    }
}

/// Terminal outcome of a task. Meaningful only once the task is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "timedout")]
    TimedOut,
    #[serde(rename = "failed")]
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::None => "none",
            TaskStatus::Success => "success",
            TaskStatus::TimedOut => "timedout",
            TaskStatus::Failure => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress report in a task's status list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl StatusEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// The persisted form of a task (one document per task in the task collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,

    pub name: String,

    pub owner: String,

    /// Owning task, set by the parent through `add_sub_task`.
    #[serde(rename = "parentid", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,

    pub started: bool,

    pub completed: bool,

    #[serde(rename = "statuslist", default)]
    pub status_list: Vec<StatusEntry>,

    #[serde(default)]
    pub tag: BTreeMap<String, String>,

    #[serde(rename = "lastupdated")]
    pub last_updated: DateTime<Utc>,

    #[serde(rename = "subtasks", default)]
    pub sub_tasks: Vec<TaskId>,

    #[serde(default)]
    pub status: TaskStatus,
}

/// A set of field assignments applied to one stored record.
///
/// Only the fields that are `Some` are written; everything else is left as stored.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub started: Option<bool>,
    pub completed: Option<bool>,
    pub status: Option<TaskStatus>,
    pub status_list: Option<Vec<StatusEntry>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub parent_id: Option<TaskId>,
    pub sub_tasks: Option<Vec<TaskId>>,
}

impl TaskUpdate {
    /// Replace the status list and bump `lastupdated`.
    pub fn status_list(list: Vec<StatusEntry>, at: DateTime<Utc>) -> Self {
        Self {
            status_list: Some(list),
            last_updated: Some(at),
            ..Self::default()
        }
    }

    /// Record the terminal transition.
    pub fn completion(status: TaskStatus, at: DateTime<Utc>) -> Self {
        Self {
            completed: Some(true),
            status: Some(status),
            last_updated: Some(at),
            ..Self::default()
        }
    }

    pub fn parent(parent_id: TaskId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    pub fn sub_tasks(sub_tasks: Vec<TaskId>) -> Self {
        Self {
            sub_tasks: Some(sub_tasks),
            ..Self::default()
        }
    }

    /// Write the assigned fields into `record`.
    pub fn apply_to(&self, record: &mut TaskRecord) {
        if let Some(started) = self.started {
            record.started = started;
        }
        if let Some(completed) = self.completed {
            record.completed = completed;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(list) = &self.status_list {
            record.status_list = list.clone();
        }
        if let Some(at) = self.last_updated {
            record.last_updated = at;
        }
        if let Some(parent_id) = self.parent_id {
            record.parent_id = Some(parent_id);
        }
        if let Some(sub_tasks) = &self.sub_tasks {
            record.sub_tasks = sub_tasks.clone();
        }
    }
}
