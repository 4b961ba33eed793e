//! RAII lock guard implementation.

use super::app_lock::AppLock;
use super::manager::LockManager;
use std::sync::Arc;

/// RAII guard for an acquired AppLock.
///
/// When dropped, every entity of the AppLock is released.
#[derive(Debug)]
pub struct LockGuard {
    manager: Arc<LockManager>,

    /// Context prefix used when releasing.
    ctx: String,

    app_lock: AppLock,

    /// Whether the lock has been released manually.
    released: bool,
}

impl LockGuard {
    pub(super) fn new(manager: Arc<LockManager>, ctx: &str, app_lock: AppLock) -> Self {
        Self {
            manager,
            ctx: ctx.to_string(),
            app_lock,
            released: false,
        }
    }

    /// The AppLock held by this guard.
    pub fn app_lock(&self) -> &AppLock {
        &self.app_lock
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(mut self) {
        self.released = true;
        self.manager.release_lock(&self.ctx, &self.app_lock);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            self.manager.release_lock(&self.ctx, &self.app_lock);
        }
    }
}
