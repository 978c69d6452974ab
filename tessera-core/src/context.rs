//! What the session manager needs to know about the request it serves.
use chrono::{DateTime, Utc};

/// How the current unit of work reached the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// A regular HTTP request; cookies travel in headers
    #[default]
    Http,
    /// A persistent socket connection (e.g. websocket). Cookies are read from the handshake
    /// but never emitted.
    Socket,
    /// Command line or background job. There is no cookie channel; a session is synthesized
    /// for every run.
    Background,
}

impl ExecutionMode {
    pub fn is_background(&self) -> bool {
        matches!(self, ExecutionMode::Background)
    }

    /// Whether `Set-Cookie` instructions can reach a client
    pub fn emits_cookies(&self) -> bool {
        matches!(self, ExecutionMode::Http)
    }
}

/// Per-request facts consumed by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub mode: ExecutionMode,
    /// The application is running its installer; sessions are disabled
    pub installing: bool,
    /// Observed client address
    pub client_ip: Option<String>,
    /// The connection is TLS-encrypted
    pub encrypted: bool,
    /// A preflight (`OPTIONS`) request, which must not set cookies
    pub preflight: bool,
    pub now: DateTime<Utc>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::http()
    }
}

impl RequestContext {
    pub fn http() -> Self {
        Self::with_mode(ExecutionMode::Http)
    }

    pub fn socket() -> Self {
        Self::with_mode(ExecutionMode::Socket)
    }

    pub fn background() -> Self {
        Self::with_mode(ExecutionMode::Background)
    }

    fn with_mode(mode: ExecutionMode) -> Self {
        Self {
            mode,
            installing: false,
            client_ip: None,
            encrypted: false,
            preflight: false,
            now: Utc::now(),
        }
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn with_preflight(mut self, preflight: bool) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn with_installing(mut self, installing: bool) -> Self {
        self.installing = installing;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Whether outbound cookies should be sent to the client for this request
    pub fn sends_cookies(&self) -> bool {
        self.mode.emits_cookies() && !self.preflight
    }
}
