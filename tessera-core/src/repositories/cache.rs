//! Process-local cache of loaded sessions, keyed by id.
use std::sync::Arc;

use dashmap::DashMap;

use crate::session::{Session, SessionId};

/// Shared lookup cache consulted before the session repository.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    entries: Arc<DashMap<SessionId, Session>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn put(&self, session: &Session) {
        self.entries.insert(session.id, session.clone());
    }

    pub fn evict(&self, id: SessionId) {
        self.entries.remove(&id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
