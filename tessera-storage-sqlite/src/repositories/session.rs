use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tessera_core::{
    Error, NewSession, Session, SessionData, SessionId, SessionToken, UserId,
    error::StorageError, map_storage_err, repositories::SessionRepository,
};

use super::{from_timestamp, map_write_err};

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteSession {
    id: i64,
    token: String,
    user_id: Option<String>,
    ip_address: Option<String>,
    created_at: i64,
    last_activity: i64,
    last_url: Option<String>,
    data: String,
}

impl TryFrom<SqliteSession> for Session {
    type Error = Error;

    fn try_from(row: SqliteSession) -> Result<Self, Self::Error> {
        Ok(Session {
            id: SessionId::new(row.id),
            token: SessionToken::new(&row.token),
            user_id: row.user_id.map(UserId::from),
            ip_address: row.ip_address,
            created_at: from_timestamp(row.created_at)?,
            last_activity: from_timestamp(row.last_activity)?,
            last_url: row.last_url,
            data: SessionData::from_blob(&row.data)?,
        })
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn find(&self, id: SessionId) -> Result<Option<Session>, Error> {
        let row = sqlx::query_as::<_, SqliteSession>("SELECT * FROM sessions WHERE id = ?1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await;

        map_storage_err!(row)?.map(Session::try_from).transpose()
    }

    async fn insert(&self, session: NewSession) -> Result<Session, Error> {
        let row = sqlx::query_as::<_, SqliteSession>(
            r#"
            INSERT INTO sessions (token, ip_address, created_at, last_activity, data)
            VALUES (?1, ?2, ?3, ?3, '{}')
            RETURNING *
            "#,
        )
        .bind(session.token.as_str())
        .bind(&session.ip_address)
        .bind(session.created_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert session");
            map_write_err(e)
        })?;

        row.try_into()
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET user_id = ?1, last_activity = ?2, last_url = ?3, data = ?4
            WHERE id = ?5
            "#,
        )
        .bind(session.user_id.as_ref().map(UserId::as_str))
        .bind(session.last_activity.timestamp())
        .bind(&session.last_url)
        .bind(session.data.to_blob()?)
        .bind(session.id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session.id, error = %e, "Failed to save session");
            map_write_err(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }

    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < ?1")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await;

        Ok(map_storage_err!(result)?.rows_affected())
    }
}
