//! Builder pattern for constructing Tessera instances
//!
//! This module provides a type-safe builder for creating [`Tessera`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use tessera::{SessionConfig, TesseraBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tessera = TesseraBuilder::new()
//!         .with_sqlite("sqlite://sessions.db?mode=rwc")
//!         .await?
//!         .with_session_config(SessionConfig::default().with_secure(true))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tessera_core::{CleanupConfig, RepositoryProvider, SessionConfig};

use crate::Tessera;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Tessera instance.
#[derive(Debug, thiserror::Error)]
pub enum TesseraBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`TesseraBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Tessera`] instances.
///
/// Storage must be configured before [`build`](TesseraBuilder::build) becomes available.
pub struct TesseraBuilder<Storage> {
    storage: Storage,
    session_config: SessionConfig,
    cleanup_config: CleanupConfig,
    apply_migrations: bool,
}

impl Default for TesseraBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseraBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Session cookie: `GDO6`, 72600 seconds, IP pinning on
    /// - Cleanup: hourly, deleting sessions idle for two days
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            session_config: SessionConfig::default(),
            cleanup_config: CleanupConfig::default(),
            apply_migrations: false,
        }
    }

    /// Use an already constructed repository provider
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> TesseraBuilder<WithStorage<R>> {
        TesseraBuilder {
            storage: WithStorage { repositories },
            session_config: self.session_config,
            cleanup_config: self.cleanup_config,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Keep sessions in process memory
    pub fn with_memory(self) -> TesseraBuilder<WithStorage<crate::MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::MemoryRepositoryProvider::new()))
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl TesseraBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<TesseraBuilder<WithStorage<crate::SqliteRepositoryProvider>>, TesseraBuilderError>
    {
        let repositories = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| TesseraBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(repositories)))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> TesseraBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> TesseraBuilder<WithStorage<R>> {
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn with_cleanup_config(mut self, config: CleanupConfig) -> Self {
        self.cleanup_config = config;
        self
    }

    /// Run migrations during [`build`](Self::build)
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Validate the configuration, optionally migrate, and build the instance.
    pub async fn build(self) -> Result<Tessera<R>, TesseraBuilderError> {
        self.session_config
            .validate()
            .map_err(|e| TesseraBuilderError::InvalidConfiguration(e.to_string()))?;
        self.cleanup_config
            .retention_window()
            .map_err(|e| TesseraBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| TesseraBuilderError::Migration(e.to_string()))?;
        }

        Ok(Tessera::new(self.storage.repositories)
            .with_session_config(self.session_config)
            .with_cleanup_config(self.cleanup_config))
    }
}
