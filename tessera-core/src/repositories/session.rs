use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    session::{NewSession, Session, SessionId},
};

/// Repository for session rows
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Find a session by id
    async fn find(&self, id: SessionId) -> Result<Option<Session>, Error>;

    /// Insert a new session; storage assigns the id
    async fn insert(&self, session: NewSession) -> Result<Session, Error>;

    /// Persist all mutable fields of an existing session
    async fn save(&self, session: &Session) -> Result<(), Error>;

    /// Delete every session whose last activity is before `cutoff`, returning the count
    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<u64, Error>;
}
