//! In-memory repositories
//!
//! Everything lives in [`DashMap`]s for the lifetime of the provider. Session ids come from a
//! counter starting at 1. The session repository also counts calls, which lets tests assert
//! that a code path did or did not touch storage.
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{
    RepositoryProvider, SessionRepository, SessionRepositoryProvider, UserRepository,
    UserRepositoryProvider,
};
use crate::{
    Error,
    error::StorageError,
    session::{NewSession, Session, SessionId},
    user::{User, UserId},
};

#[derive(Debug)]
pub struct MemorySessionRepository {
    sessions: DashMap<SessionId, Session>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
    finds: AtomicUsize,
    inserts: AtomicUsize,
    saves: AtomicUsize,
}

impl Default for MemorySessionRepository {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicI64::new(1),
            unavailable: AtomicBool::new(false),
            finds: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session row as-is, bypassing id assignment
    pub fn put(&self, session: Session) {
        self.next_id
            .fetch_max(session.id.as_i64() + 1, Ordering::SeqCst);
        self.sessions.insert(session.id, session);
    }

    /// Read a row without counting it as a lookup
    pub fn peek(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Make every subsequent call fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("session store unavailable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn find(&self, id: SessionId) -> Result<Option<Session>, Error> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn insert(&self, session: NewSession) -> Result<Session, Error> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        if session.token.is_empty() {
            return Err(StorageError::Constraint("session token must not be empty".to_string()).into());
        }
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let session = session.into_session(id);
        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        match self.sessions.get_mut(&session.id) {
            Some(mut row) => {
                *row = session.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound.into()),
        }
    }

    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        self.ensure_available()?;
        let mut removed = 0u64;
        self.sessions.retain(|_, s| {
            let keep = !s.is_inactive_since(cutoff);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: DashMap<UserId, User>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, Error> {
        if self.users.contains_key(&user.id) {
            return Err(StorageError::Constraint(format!("user {} already exists", user.id)).into());
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }
}

/// Repository provider backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepositoryProvider {
    sessions: Arc<MemorySessionRepository>,
    users: Arc<MemoryUserRepository>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRepositoryProvider for MemoryRepositoryProvider {
    type SessionRepo = MemorySessionRepository;

    fn session(&self) -> &Self::SessionRepo {
        &self.sessions
    }
}

impl UserRepositoryProvider for MemoryRepositoryProvider {
    type UserRepo = MemoryUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.users
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        self.sessions.ensure_available()
    }
}
