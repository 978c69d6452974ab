//! Service layer for session logic
//!
//! This module contains the request-scoped session manager, the per-session lock registry
//! and the cleanup job for idle sessions.

pub mod cleanup;
pub mod lock;
pub mod session;

pub use cleanup::CleanupJob;
pub use lock::{LockRegistry, SessionLock};
pub use session::{SessionContext, SessionManager};
