//! Configuration types and defaults for clusterops.
//!
//! This module defines enums, constants, and default value functions
//! used by the Config struct.

use serde::{Deserialize, Serialize};

/// Log levels accepted by `log_level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Which document store backs the task collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// One JSON document per task under `{data_dir}/{tasks_collection}` (default).
    #[default]
    File,
    /// Process-local map; records vanish on exit.
    Memory,
}

impl StoreBackend {
    /// Parse a store backend from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

pub(crate) fn default_data_dir() -> String {
    ".clusterops".to_string()
}

pub(crate) fn default_tasks_collection() -> String {
    "tasks".to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_id_allocation_attempts() -> u32 {
    8
}

pub(crate) fn default_true() -> bool {
    true
}
