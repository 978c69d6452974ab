//! Schema migrations for tessera storage backends
//!
//! A backend lists its [`Migration`]s in version order and hands them to its
//! [`MigrationManager`], which records every applied version in [`MIGRATION_TABLE`] and
//! skips it on later runs.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Database;
use tessera_core::error::StorageError;
use thiserror::Error;

/// Bookkeeping table of applied migrations
pub const MIGRATION_TABLE: &str = "_tessera_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for tessera_core::Error {
    fn from(error: MigrationError) -> Self {
        tessera_core::Error::Storage(StorageError::Migration(error.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix seconds
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.applied_at, 0)
    }
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations, in the order given
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback applied migrations, in the order given
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_into_core_error() {
        let error: tessera_core::Error = MigrationError::Migration("boom".to_string()).into();
        assert!(error.is_storage_error());
        assert_eq!(
            error.to_string(),
            "Storage error: Migration error: Migration failed: boom"
        );
    }

    #[test]
    fn test_record_timestamp() {
        let record = MigrationRecord {
            version: 1,
            name: "CreateUsersTable".to_string(),
            applied_at: 1_700_000_000,
        };
        assert_eq!(record.applied_at().map(|t| t.timestamp()), Some(1_700_000_000));
    }
}
