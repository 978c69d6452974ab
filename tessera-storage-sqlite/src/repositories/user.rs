use async_trait::async_trait;
use sqlx::SqlitePool;
use tessera_core::{
    Error, User, UserId, error::utilities::DatabaseResultExt, repositories::UserRepository,
};

use super::{from_timestamp, map_write_err};

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteUser {
    id: String,
    name: Option<String>,
    created_at: i64,
}

impl TryFrom<SqliteUser> for User {
    type Error = Error;

    fn try_from(row: SqliteUser) -> Result<Self, Self::Error> {
        User::builder()
            .id(UserId::from(row.id))
            .name(row.name)
            .created_at(from_timestamp(row.created_at)?)
            .build()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: User) -> Result<User, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(
            r#"
            INSERT INTO users (id, name, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(user.created_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, SqliteUser>("SELECT * FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_db_err_with_context("Failed to find user")?
            .map(User::try_from)
            .transpose()
    }
}
