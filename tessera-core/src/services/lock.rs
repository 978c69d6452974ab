//! Per-session mutual exclusion
//!
//! Concurrent requests carrying the same cookie may want to serialize their
//! read-modify-commit cycle. A [`LockRegistry`] hands out one async mutex per session id;
//! holding a [`SessionLock`] keeps other holders of that id waiting. The entry is dropped
//! from the registry when the last interested party lets go.
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::session::SessionId;

type LockMap = DashMap<SessionId, Arc<Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<LockMap>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of session `id`
    pub async fn acquire(&self, id: SessionId) -> SessionLock {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let waiting = Arc::clone(&mutex);
        let pending = PendingLock {
            id,
            locks: &self.locks,
            mutex: Some(mutex),
        };
        let guard = waiting.lock_owned().await;
        drop(pending);
        tracing::debug!(session_id = %id, "Acquired session lock");
        SessionLock {
            id,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Whether someone currently holds the lock of session `id`
    pub fn is_locked(&self, id: SessionId) -> bool {
        self.locks
            .get(&id)
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }

    /// Number of sessions with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Drop the registry entry of `id` once only the map references its mutex
fn prune(locks: &LockMap, id: SessionId) {
    locks.remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// Interest in a session lock while waiting for it.
///
/// A waiter cancelled mid-wait prunes the entry it may have left behind.
struct PendingLock<'a> {
    id: SessionId,
    locks: &'a LockMap,
    mutex: Option<Arc<Mutex<()>>>,
}

impl Drop for PendingLock<'_> {
    fn drop(&mut self) {
        drop(self.mutex.take());
        prune(self.locks, self.id);
    }
}

/// Held lock on one session; released on drop.
#[derive(Debug)]
pub struct SessionLock {
    id: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl SessionLock {
    pub fn session_id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, self.id);
        tracing::debug!(session_id = %self.id, "Released session lock");
    }
}
