//! Lock table records and their reporting form.

use super::app_lock::EntityId;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// One held lock: why it was taken and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// The holder's reason, copied from the AppLock.
    pub reason: String,

    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    /// Create a record acquired now.
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            acquired_at: Utc::now(),
        }
    }

    /// How long the lock has been held.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }
}

/// A held lock as reported by [`LockManager::list_locks`](super::LockManager::list_locks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub entity: EntityId,
    pub record: LockRecord,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (reason: {}, age: {})",
            self.entity,
            self.record.reason,
            self.record.age_string()
        )
    }
}
