//! # Tessera Axum Integration
//!
//! Middleware that applies the Tessera session protocol to Axum requests. The layer reads the
//! request's cookies, starts its session (probe cookie, session creation or reload), hands
//! the session context to handlers through the [`CurrentSession`] extractor, commits it after
//! the handler returns and writes the outbound cookies as `Set-Cookie` headers.
//!
//! The client IP comes from [`ConnectInfo`](axum::extract::ConnectInfo), so serve the app
//! with `into_make_service_with_connect_info::<SocketAddr>()` when IP pinning is enabled.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use axum::{Router, routing::get};
//! use tessera::{MemoryRepositoryProvider, TesseraBuilder};
//! use tessera_axum::{CurrentSession, SessionLayerError, SessionRouterExt};
//!
//! async fn visits(
//!     session: CurrentSession<MemoryRepositoryProvider>,
//! ) -> Result<String, SessionLayerError> {
//!     let mut session = session.lock().await;
//!     let visits: u32 = session.get("visits", 0).await?;
//!     session.set("visits", visits + 1).await?;
//!     Ok(format!("visit #{}", visits + 1))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let tessera = TesseraBuilder::new().with_memory().build().await.unwrap();
//!
//!     let app = Router::new()
//!         .route("/", get(visits))
//!         .session_layer(Arc::new(tessera));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await
//!     .unwrap();
//! }
//! ```

mod cookies;
mod error;
mod extractors;
mod middleware;

pub use cookies::{append_set_cookies, to_cookie};
pub use error::{Result, SessionLayerError};
pub use extractors::{ConnectionInfo, CurrentSession};
pub use middleware::{SessionRouterExt, SessionState, request_context, session_middleware};
