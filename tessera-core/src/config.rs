//! Session and cleanup configuration
//!
//! Both configs implement `Deserialize` with per-field defaults, so an application can embed
//! them in its own configuration file, and expose builder methods for programmatic setup.
use std::{str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, error::ValidationError};

/// Upper bound for the session cookie lifetime
pub const MAX_COOKIE_AGE_SECS: i64 = 365 * 24 * 60 * 60;

/// Default session cookie lifetime, a little over 20 hours
pub const DEFAULT_COOKIE_AGE_SECS: i64 = 72_600;

/// Suffix appended to the cookie name on encrypted connections
pub const TLS_COOKIE_SUFFIX: &str = "_tls";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(value)
    }
}

impl FromStr for SameSite {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown same-site policy: {other}"
            ))),
        }
    }
}

/// Cookie and session behaviour.
///
/// # Example
///
/// ```rust
/// use tessera_core::config::{SameSite, SessionConfig};
///
/// let config = SessionConfig::default()
///     .with_cookie_name("APP")
///     .with_domain("example.com")
///     .with_max_age(3600)
///     .with_same_site(SameSite::Strict);
///
/// assert_eq!(config.cookie_name_for(true), "APP_tls");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base cookie name; `_tls` is appended on encrypted connections
    pub cookie_name: String,
    pub domain: String,
    pub path: String,
    /// Cookie lifetime in seconds, within `[-1, one year]`. Negative means a browser-session
    /// cookie without an expiry.
    #[serde(deserialize_with = "deserialize_max_age")]
    pub max_age: i64,
    /// Let client-side scripts read the cookie (disables `HttpOnly`)
    pub js_accessible: bool,
    /// Request `Secure` cookies; only honoured on encrypted connections
    pub secure: bool,
    pub same_site: SameSite,
    /// Pin new sessions to the creating client's IP address
    pub ip_pinning: bool,
    /// Cache session rows by id between lookups
    pub cache_lookups: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "GDO6".to_string(),
            domain: "localhost".to_string(),
            path: "/".to_string(),
            max_age: DEFAULT_COOKIE_AGE_SECS,
            js_accessible: false,
            secure: false,
            same_site: SameSite::Lax,
            ip_pinning: true,
            cache_lookups: false,
        }
    }
}

fn clamp_max_age(seconds: i64) -> i64 {
    seconds.clamp(-1, MAX_COOKIE_AGE_SECS)
}

fn deserialize_max_age<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_max_age)
}

impl SessionConfig {
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie lifetime in seconds, clamped to `[-1, one year]`
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = clamp_max_age(seconds);
        self
    }

    pub fn with_js_accessible(mut self, js_accessible: bool) -> Self {
        self.js_accessible = js_accessible;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn with_ip_pinning(mut self, ip_pinning: bool) -> Self {
        self.ip_pinning = ip_pinning;
        self
    }

    pub fn with_cache_lookups(mut self, cache_lookups: bool) -> Self {
        self.cache_lookups = cache_lookups;
        self
    }

    /// The cookie name in effect for a connection
    pub fn cookie_name_for(&self, encrypted: bool) -> String {
        if encrypted {
            format!("{}{TLS_COOKIE_SUFFIX}", self.cookie_name)
        } else {
            self.cookie_name.clone()
        }
    }

    /// `Secure` is only set when configured and the connection is actually encrypted
    pub fn secure_for(&self, encrypted: bool) -> bool {
        self.secure && encrypted
    }

    pub fn http_only(&self) -> bool {
        !self.js_accessible
    }

    /// Lifetime of the session cookie, `None` for a browser-session cookie
    pub fn cookie_lifetime(&self) -> Option<Duration> {
        (self.max_age >= 0).then(|| Duration::seconds(self.max_age))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.cookie_name.is_empty() {
            return Err(ValidationError::MissingField("Cookie name is required".to_string()).into());
        }
        if self
            .cookie_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "=;,".contains(c))
        {
            return Err(ValidationError::InvalidField(format!(
                "Invalid cookie name: {}",
                self.cookie_name
            ))
            .into());
        }
        Ok(())
    }
}

/// Settings for the periodic session cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// How often to run the cleanup task (default: 1 hour)
    pub interval: StdDuration,
    /// Sessions idle for longer than this are deleted (default: 2 days)
    pub retention: StdDuration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: StdDuration::from_secs(3600),
            retention: StdDuration::from_secs(2 * 24 * 3600),
        }
    }
}

impl CleanupConfig {
    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: StdDuration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention_window(&self) -> Result<Duration, Error> {
        Duration::from_std(self.retention).map_err(|e| {
            ValidationError::InvalidField(format!("Retention out of range: {e}")).into()
        })
    }
}
