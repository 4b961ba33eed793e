//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a clusterops process.
///
/// This struct represents the contents of `clusterops.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Which document store holds task records.
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Root directory for file-backed collections.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Name of the task collection (a directory under `data_dir`).
    #[serde(default = "default_tasks_collection")]
    pub tasks_collection: String,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Whether to empty the lock table when the service context is built.
    #[serde(default = "default_true")]
    pub clear_locks_on_startup: bool,

    // =========================================================================
    // Task settings
    // =========================================================================
    /// How many fresh ids to try before giving up on a colliding allocation.
    #[serde(default = "default_id_allocation_attempts")]
    pub id_allocation_attempts: u32,

    /// Seconds after which `exec` stops its task (0 disables).
    #[serde(default)]
    pub exec_timeout_secs: u64,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            tasks_collection: default_tasks_collection(),
            clear_locks_on_startup: default_true(),
            id_allocation_attempts: default_id_allocation_attempts(),
            exec_timeout_secs: 0,
            log_level: default_log_level(),
        }
    }
}
