//! Repository traits for data access layer
//!
//! This module defines the repository interfaces the session manager uses to interact with
//! storage.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] combines the provider traits plus lifecycle methods
//!
//! [`memory::MemoryRepositoryProvider`] is a complete in-process backend for tests and
//! single-process tools.

pub mod cache;
pub mod memory;
pub mod session;
pub mod user;

pub use cache::SessionCache;
pub use memory::{MemoryRepositoryProvider, MemorySessionRepository, MemoryUserRepository};
pub use session::SessionRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for session repository access.
pub trait SessionRepositoryProvider: Send + Sync + 'static {
    /// The session repository implementation type
    type SessionRepo: SessionRepository;

    /// Get the session repository
    fn session(&self) -> &Self::SessionRepo;
}

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    /// The user repository implementation type
    type UserRepo: UserRepository;

    /// Get the user repository
    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait that storage implementations implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement [`SessionRepository`] and [`UserRepository`] for your backend
/// 2. Implement the individual `*RepositoryProvider` traits
/// 3. Implement `RepositoryProvider` with `migrate()` and `health_check()`
///
/// ```rust,ignore
/// use tessera_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl SessionRepositoryProvider for MyStorage {
///     type SessionRepo = MySessionRepository;
///     fn session(&self) -> &Self::SessionRepo { &self.sessions }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: SessionRepositoryProvider + UserRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
