//! Repository implementations for SQLite storage
//!
//! Timestamps are stored as unix seconds.

pub mod session;
pub mod user;

pub use session::SqliteSessionRepository;
pub use user::SqliteUserRepository;

use chrono::{DateTime, Utc};
use tessera_core::{Error, error::StorageError};

fn from_timestamp(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| StorageError::Database(format!("Invalid timestamp: {seconds}")).into())
}

/// Constraint violations become [`StorageError::Constraint`], the rest database errors
fn map_write_err(error: sqlx::Error) -> Error {
    match &error {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_check_violation()
                || db.is_foreign_key_violation() =>
        {
            StorageError::Constraint(db.message().to_string()).into()
        }
        _ => StorageError::Database(error.to_string()).into(),
    }
}
