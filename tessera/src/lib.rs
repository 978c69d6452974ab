//! # Tessera
//!
//! Tessera keeps server-side sessions in a database row and hands the client a single cookie,
//! `"<id>-<token>"`, to find it again. The sequential id locates the row, the random token
//! proves the client owns it, and an optional pinned IP address narrows it to one network
//! location.
//!
//! Clients are not trusted to accept cookies: a client without a session first receives a
//! short-lived probe cookie and only gets a row once it echoes the probe back. Bots that
//! ignore cookies therefore never create sessions.
//!
//! Features:
//! - Request-scoped session contexts with lazy start, reset and commit
//! - Key/value session data persisted as JSON
//! - Binding sessions to users, with a ghost identity for everybody else
//! - Optional per-session locks and a by-id lookup cache
//! - Periodic deletion of idle sessions
//!
//! ## Storage Support
//!
//! - SQLite (feature `sqlite`, enabled by default)
//! - In-memory, for tests and single-process tools
//!
//! ## Example
//!
//! ```rust,no_run
//! use tessera::{CookieJar, RequestContext, TesseraBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tessera = TesseraBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let jar = CookieJar::from_inbound([("GDO6", "GDO_like_16_byte")]);
//!     let mut session = tessera.begin(RequestContext::http().with_client_ip("127.0.0.1"), jar);
//!     session.set("visits", 1).await?;
//!     session.commit().await?;
//!
//!     for cookie in session.take_cookies() {
//!         println!("Set-Cookie: {}={}", cookie.name, cookie.value);
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use tessera_core::{
    repositories::{UserRepository, UserRepositoryProvider},
    services::{CleanupJob, SessionContext, SessionManager},
};

mod builder;

pub use builder::{NoStorage, TesseraBuilder, TesseraBuilderError, WithStorage};

/// Re-export core types from tessera_core
///
/// These types are commonly used when working with the Tessera API.
pub use tessera_core::{
    CleanupConfig, CookieJar, ExecutionMode, Identity, RepositoryProvider, RequestContext,
    SameSite, Session, SessionConfig, SessionData, SessionId, SessionToken, SetCookie, User,
    UserId, cookie::DUMMY_COOKIE_CONTENT, repositories::MemoryRepositoryProvider,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use tessera_storage_sqlite::SqliteRepositoryProvider;

/// Errors that can occur when using Tessera.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// A session could not be started or used
    #[error("Session error: {0}")]
    SessionError(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<tessera_core::Error> for TesseraError {
    fn from(error: tessera_core::Error) -> Self {
        if error.is_storage_error() {
            TesseraError::StorageError(error.to_string())
        } else if error.is_validation_error() {
            TesseraError::ConfigError(error.to_string())
        } else {
            TesseraError::SessionError(error.to_string())
        }
    }
}

/// The main coordinator for session handling.
///
/// Holds the storage, the shared [`SessionManager`] and the cleanup schedule. Cloning is
/// cheap; clones share everything.
pub struct Tessera<R: RepositoryProvider> {
    repositories: Arc<R>,
    sessions: SessionManager<R>,
    cleanup_config: CleanupConfig,
}

impl<R: RepositoryProvider> Clone for Tessera<R> {
    fn clone(&self) -> Self {
        Self {
            repositories: Arc::clone(&self.repositories),
            sessions: self.sessions.clone(),
            cleanup_config: self.cleanup_config.clone(),
        }
    }
}

impl<R: RepositoryProvider> Tessera<R> {
    /// Create a new Tessera instance with default session and cleanup settings
    pub fn new(repositories: Arc<R>) -> Self {
        Self {
            sessions: SessionManager::new(Arc::clone(&repositories), SessionConfig::default()),
            repositories,
            cleanup_config: CleanupConfig::default(),
        }
    }

    /// Replace the session configuration.
    ///
    /// The lookup cache and lock registry start empty.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.sessions = SessionManager::new(Arc::clone(&self.repositories), config);
        self
    }

    pub fn with_cleanup_config(mut self, config: CleanupConfig) -> Self {
        self.cleanup_config = config;
        self
    }

    pub fn session_config(&self) -> &SessionConfig {
        self.sessions.config()
    }

    pub fn cleanup_config(&self) -> &CleanupConfig {
        &self.cleanup_config
    }

    pub fn session_manager(&self) -> &SessionManager<R> {
        &self.sessions
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    /// Open the session context of one request
    pub fn begin(&self, request: RequestContext, jar: CookieJar) -> SessionContext<R> {
        self.sessions.context(request, jar)
    }

    /// A cleanup job sharing this instance's storage and lookup cache
    pub fn cleanup_job(&self) -> CleanupJob<R> {
        CleanupJob::new(Arc::clone(&self.repositories), self.cleanup_config.clone())
            .with_cache(self.sessions.cache().cloned())
    }

    /// Delete idle sessions once, returning how many were removed
    pub async fn cleanup_sessions(&self) -> Result<u64, TesseraError> {
        Ok(self.cleanup_job().run().await?)
    }

    /// Delete idle sessions on the configured interval until `shutdown` changes
    pub fn spawn_cleanup(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.cleanup_job().spawn(shutdown)
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), TesseraError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| TesseraError::StorageError(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), TesseraError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| TesseraError::StorageError(e.to_string()))
    }

    /// Get a user by their ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, TesseraError> {
        Ok(self.repositories.user().find_by_id(user_id).await?)
    }

    /// Store a new user sessions can be bound to
    pub async fn create_user(&self, user: User) -> Result<User, TesseraError> {
        Ok(self.repositories.user().create(user).await?)
    }
}
