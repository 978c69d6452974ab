//! Session management
//!
//! This module contains the core session struct and related functionality.
//!
//! A session is one database row, identified by a sequential id and guarded by a random
//! token. The client holds both in a single cookie, `"<id>-<token>"`; the id alone is
//! guessable, so a session is only honoured when the token matches as well.
//!
//! | Field           | Type               | Description                                        |
//! | --------------- | ------------------ | -------------------------------------------------- |
//! | `id`            | `i64`              | Auto-incremented identifier, assigned by storage.  |
//! | `token`         | `String`           | Random credential, never changes.                  |
//! | `user_id`       | `Option<String>`   | The bound user, `None` for anonymous sessions.     |
//! | `ip_address`    | `Option<String>`   | Client address the session is pinned to, if any.   |
//! | `created_at`    | `DateTime`         | The timestamp when the session was created.        |
//! | `last_activity` | `DateTime`         | Refreshed on every load and save.                  |
//! | `last_url`      | `Option<String>`   | Last URL the client visited, advisory.             |
//! | `data`          | [`SessionData`]    | Key/value store, persisted as one JSON blob.       |

mod data;

pub use data::SessionData;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{crypto, user::UserId};

/// Storage-assigned session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The secret half of a session cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    /// Create a new random token with 256 bits of entropy
    pub fn new_random() -> Self {
        Self(crypto::generate_secure_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare against a presented token in constant time
    pub fn verify(&self, presented: &str) -> bool {
        crypto::constant_time_compare(self.0.as_bytes(), presented.as_bytes())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new_random()
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The unique identifier for the session.
    pub id: SessionId,

    /// The secret that must accompany the id.
    pub token: SessionToken,

    /// The user bound to the session, if someone signed in.
    pub user_id: Option<UserId>,

    /// The IP address the session is pinned to.
    pub ip_address: Option<String>,

    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,

    /// The timestamp of the last load or save.
    pub last_activity: DateTime<Utc>,

    /// The last URL visited with this session.
    pub last_url: Option<String>,

    /// Arbitrary key/value data.
    pub data: SessionData,
}

impl Session {
    /// The value carried by the session cookie: `"<id>-<token>"`
    pub fn cookie_value(&self) -> String {
        format!("{}-{}", self.id, self.token.as_str())
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Mark the session as active at `now`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Whether the session has been idle since before `cutoff`
    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity < cutoff
    }
}

/// The initial fields of a session row; storage assigns the id on insert.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: SessionToken,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSession {
    /// A fresh anonymous session created at `now` with a random token
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            token: SessionToken::new_random(),
            ip_address: None,
            created_at: now,
        }
    }

    pub fn with_ip_address(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    /// Materialize the row once storage has assigned an id
    pub fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            token: self.token,
            user_id: None,
            ip_address: self.ip_address,
            created_at: self.created_at,
            last_activity: self.created_at,
            last_url: None,
            data: SessionData::default(),
        }
    }
}
