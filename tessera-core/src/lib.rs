//! Core functionality for the tessera project
//!
//! This crate contains cookie-backed database sessions independent of any web framework or
//! storage engine:
//!
//! - [`Session`] rows with their id, secret token, optional user binding, pinned client
//!   address and JSON data blob
//! - the cookie protocol in [`cookie`]: the dummy-cookie bootstrap, `"<id>-<token>"` values
//!   and the [`CookieJar`] the web layer translates into headers
//! - the request-scoped [`SessionContext`] handed out by a [`SessionManager`]
//! - the [`CleanupJob`] deleting idle sessions
//!
//! Storage backends implement the traits in [`repositories`]. An in-memory backend ships with
//! this crate; see `tessera-storage-sqlite` for a persistent one.
pub mod config;
pub mod context;
pub mod cookie;
pub mod crypto;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod session;
pub mod user;

pub use config::{CleanupConfig, SameSite, SessionConfig};
pub use context::{ExecutionMode, RequestContext};
pub use cookie::{CookieJar, SetCookie};
pub use error::Error;
pub use repositories::RepositoryProvider;
pub use services::{CleanupJob, SessionContext, SessionManager};
pub use session::{NewSession, Session, SessionData, SessionId, SessionToken};
pub use user::{Identity, User, UserId};
