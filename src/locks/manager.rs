//! The process-wide lock table.

use super::app_lock::{AppLock, EntityId};
use super::guard::LockGuard;
use super::metadata::{LockInfo, LockRecord};
use crate::error::{OpsError, Result};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Table of entity locks shared by every caller in the process.
///
/// All operations run under one mutex, so an acquire either sees none of another
/// acquire's entries or all of them.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<EntityId, LockRecord>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every entity of `app_lock`, or none of them.
    ///
    /// `ctx` is a caller label prefixed to log lines.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every entity is now held with its reason
    /// * `Err(OpsError::LockConflict)` - The lowest already-held entity and its holder's reason;
    ///   the table is unchanged
    pub fn acquire_lock(&self, ctx: &str, app_lock: &AppLock) -> Result<()> {
        let mut locks = self.locks();

        for entity in app_lock.entities() {
            if let Some(held) = locks.get(entity) {
                debug!("{}: entity {} already locked for '{}'", ctx, entity, held.reason);
                return Err(OpsError::LockConflict {
                    entity: entity.to_string(),
                    reason: held.reason.clone(),
                });
            }
        }

        for (entity, reason) in app_lock.locks() {
            locks.insert(*entity, LockRecord::new(reason));
        }
        debug!("{}: acquired locks {}", ctx, app_lock);
        Ok(())
    }

    /// Release every entity of `app_lock`.
    ///
    /// Entities that are not held are logged and skipped, so releasing twice is harmless.
    /// Entries are removed regardless of which AppLock acquired them.
    pub fn release_lock(&self, ctx: &str, app_lock: &AppLock) {
        let mut locks = self.locks();

        for entity in app_lock.entities() {
            if locks.remove(entity).is_none() {
                error!("{}: no lock found for unlocking entity {}", ctx, entity);
            }
        }
        debug!("{}: released locks {}", ctx, app_lock);
    }

    /// Acquire `app_lock` and return a guard that releases it on drop.
    pub fn acquire_guard(self: &Arc<Self>, ctx: &str, app_lock: AppLock) -> Result<LockGuard> {
        self.acquire_lock(ctx, &app_lock)?;
        Ok(LockGuard::new(Arc::clone(self), ctx, app_lock))
    }

    /// Drop every entry. Returns how many were held.
    pub fn clear(&self) -> usize {
        let mut locks = self.locks();
        let count = locks.len();
        locks.clear();
        if count > 0 {
            info!("Cleared {} entity lock(s)", count);
        }
        count
    }

    /// Every held lock, ordered by entity id.
    pub fn list_locks(&self) -> Vec<LockInfo> {
        let mut infos: Vec<LockInfo> = self
            .locks()
            .iter()
            .map(|(entity, record)| LockInfo {
                entity: *entity,
                record: record.clone(),
            })
            .collect();
        infos.sort_by_key(|info| info.entity);
        infos
    }

    /// Whether `entity` is currently held.
    pub fn is_locked(&self, entity: &EntityId) -> bool {
        self.locks().contains_key(entity)
    }

    /// The reason `entity` is held, if it is.
    pub fn holder_reason(&self, entity: &EntityId) -> Option<String> {
        self.locks().get(entity).map(|record| record.reason.clone())
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<EntityId, LockRecord>> {
        self.locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
