//! Per-integration sync locks.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

type LockKey = (String, String);

/// Set of `(user_id, integration_id)` pairs with a run in flight.
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    active: Arc<Mutex<HashSet<LockKey>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a run already holds the lock. The lock is released when
    /// the guard drops, including during unwinding.
    pub fn try_acquire(&self, user_id: &str, integration_id: &str) -> Option<SyncLockGuard> {
        let key = (user_id.to_string(), integration_id.to_string());
        if !self.active.lock().insert(key.clone()) {
            return None;
        }
        Some(SyncLockGuard { key, active: Arc::clone(&self.active) })
    }

    pub fn is_locked(&self, user_id: &str, integration_id: &str) -> bool {
        self.active.lock().contains(&(user_id.to_string(), integration_id.to_string()))
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Held for the duration of one sync run.
#[derive(Debug)]
pub struct SyncLockGuard {
    key: LockKey,
    active: Arc<Mutex<HashSet<LockKey>>>,
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}
