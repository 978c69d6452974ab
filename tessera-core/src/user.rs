//! Users and request identities
//!
//! A session only holds a weak reference to a user: the [`UserId`]. The user record itself
//! lives in the application's user table and is resolved through a
//! [`UserRepository`](crate::repositories::UserRepository).
//!
//! | Field        | Type             | Description                             |
//! | ------------ | ---------------- | --------------------------------------- |
//! | `id`         | `String`         | The unique identifier for the user.     |
//! | `name`       | `Option<String>` | The display name of the user.           |
//! | `created_at` | `DateTime`       | The timestamp when the user was created. |
//!
//! Requests without a signed-in user are served as the [`Identity::Ghost`].
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::utilities::RequiredFieldExt,
    id::generate_prefixed_id,
};

/// A unique, stable identifier for a specific user
/// This value should be treated as opaque
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    pub name: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }
}

#[derive(Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    name: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl UserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> Result<User, Error> {
        Ok(User {
            id: self.id.require_field("User ID")?,
            name: self.name,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Who the current request acts as.
///
/// There is always an identity: a request without a session, or with an anonymous session,
/// acts as the ghost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Ghost,
    User(User),
}

impl Identity {
    pub fn ghost() -> Self {
        Identity::Ghost
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, Identity::Ghost)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Ghost => None,
            Identity::User(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user().map(|user| &user.id)
    }
}

impl From<Option<User>> for Identity {
    fn from(user: Option<User>) -> Self {
        user.map_or(Identity::Ghost, Identity::User)
    }
}
