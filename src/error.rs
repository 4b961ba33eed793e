//! Error types for clusterops.
//!
//! Uses thiserror for derive macros. Every variant maps to a process exit code so
//! the CLI can report failures consistently.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for clusterops operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// A fresh task identifier could not be allocated.
    #[error("failed to allocate task id: {0}")]
    IdGeneration(String),

    /// No task with this id is known (live table or persisted store, depending on the call).
    #[error("task id {id} not found")]
    TaskNotFound { id: String },

    /// An entity requested by an AppLock is already held.
    #[error("unable to acquire the lock for {entity}: held for '{reason}'")]
    LockConflict { entity: String, reason: String },

    /// The document store failed to read or write a record.
    #[error("store error: {0}")]
    StoreError(String),

    /// Configuration could not be read or failed validation.
    #[error("config error: {0}")]
    ConfigError(String),

    /// An executed task reached a terminal state other than success.
    #[error("task {id} finished with status {status}")]
    TaskFailed { id: String, status: String },

    /// A worker or watcher thread could not be started.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// User provided invalid arguments.
    #[error("{0}")]
    UserError(String),
}

impl OpsError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            OpsError::IdGeneration(_) => exit_codes::USER_ERROR,
            OpsError::TaskNotFound { .. } => exit_codes::NOT_FOUND,
            OpsError::LockConflict { .. } => exit_codes::LOCK_CONFLICT,
            OpsError::StoreError(_) => exit_codes::STORE_FAILURE,
            OpsError::ConfigError(_) => exit_codes::USER_ERROR,
            OpsError::TaskFailed { .. } => exit_codes::TASK_FAILED,
            OpsError::Runtime(_) => exit_codes::USER_ERROR,
            OpsError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    pub(crate) fn not_found(id: impl ToString) -> Self {
        OpsError::TaskNotFound { id: id.to_string() }
    }
}

/// Result type alias for clusterops operations.
pub type Result<T> = std::result::Result<T, OpsError>;
