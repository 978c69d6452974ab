use async_trait::async_trait;

use crate::{
    Error,
    user::{User, UserId},
};

/// Repository for the users sessions can be bound to
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user
    async fn create(&self, user: User) -> Result<User, Error>;

    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;
}
