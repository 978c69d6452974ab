//! Session cookie protocol
//!
//! The manager never talks to an HTTP stack directly. It reads inbound values from a
//! [`CookieJar`] and records outbound [`SetCookie`] instructions in it; the web layer turns
//! those into `Set-Cookie` headers.
//!
//! Two cookies share the configured name:
//!
//! - the **dummy cookie** carries [`DUMMY_COOKIE_CONTENT`] for [`DUMMY_COOKIE_EXPIRES`]
//!   seconds. A client that echoes it back has proven it accepts cookies and gets a real
//!   session.
//! - the **session cookie** carries `"<id>-<token>"`.
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{SameSite, SessionConfig},
    error::SessionError,
    session::SessionId,
};

/// Sentinel value of the cookie-acceptance probe
pub const DUMMY_COOKIE_CONTENT: &str = "GDO_like_16_byte";

/// Lifetime of the probe cookie in seconds
pub const DUMMY_COOKIE_EXPIRES: i64 = 300;

/// Separator between id and token in the session cookie
pub const COOKIE_SEPARATOR: char = '-';

/// Split a session cookie value into id and token.
///
/// Only the first separator counts, so the token may contain more of them.
pub fn parse_cookie_value(value: &str) -> Result<(SessionId, &str), SessionError> {
    match value.split_once(COOKIE_SEPARATOR) {
        Some((id, token)) if !id.is_empty() => {
            let id = id.parse().map_err(|_| SessionError::MalformedCookie)?;
            Ok((id, token))
        }
        _ => Err(SessionError::MalformedCookie),
    }
}

/// An outbound cookie instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// `None` for a browser-session cookie
    pub expires: Option<DateTime<Utc>>,
    pub path: String,
    pub domain: String,
    pub same_site: SameSite,
    pub secure: bool,
    pub http_only: bool,
}

impl SetCookie {
    fn from_config(
        config: &SessionConfig,
        encrypted: bool,
        value: String,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: config.cookie_name_for(encrypted),
            value,
            expires,
            path: config.path.clone(),
            domain: config.domain.clone(),
            same_site: config.same_site,
            secure: config.secure_for(encrypted),
            http_only: config.http_only(),
        }
    }

    /// The real session cookie, expiring after the configured max age
    pub fn session(
        config: &SessionConfig,
        encrypted: bool,
        value: String,
        now: DateTime<Utc>,
    ) -> Self {
        let expires = config.cookie_lifetime().map(|lifetime| now + lifetime);
        Self::from_config(config, encrypted, value, expires)
    }

    /// The short-lived cookie-acceptance probe
    pub fn dummy(config: &SessionConfig, encrypted: bool, now: DateTime<Utc>) -> Self {
        let expires = now + Duration::seconds(DUMMY_COOKIE_EXPIRES);
        Self::from_config(
            config,
            encrypted,
            DUMMY_COOKIE_CONTENT.to_string(),
            Some(expires),
        )
    }

    pub fn is_dummy(&self) -> bool {
        self.value == DUMMY_COOKIE_CONTENT
    }
}

/// Inbound cookie values and outbound instructions for one request.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    inbound: HashMap<String, String>,
    outbound: Vec<SetCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from the cookies the client sent
    pub fn from_inbound<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inbound: cookies
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
            outbound: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inbound.get(name).map(String::as_str)
    }

    /// Write a value into the inbound set, as if the client had sent it.
    ///
    /// Used where no cookie channel exists, so later logic in the same process reads the
    /// value back consistently.
    pub fn reflect(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inbound.insert(name.into(), value.into());
    }

    pub fn push(&mut self, cookie: SetCookie) {
        self.outbound.push(cookie);
    }

    pub fn outbound(&self) -> &[SetCookie] {
        &self.outbound
    }

    pub fn take_outbound(&mut self) -> Vec<SetCookie> {
        std::mem::take(&mut self.outbound)
    }
}
