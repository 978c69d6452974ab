use std::{net::SocketAddr, sync::Arc};

use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use tessera_core::{RepositoryProvider, SessionContext};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::SessionLayerError;

/// The session context of the current request.
///
/// Installed by the session middleware. Clones share one context; the middleware commits it
/// after the handler returns, so handlers must drop their guard before then.
pub struct CurrentSession<R: RepositoryProvider>(Arc<Mutex<SessionContext<R>>>);

impl<R: RepositoryProvider> Clone for CurrentSession<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: RepositoryProvider> CurrentSession<R> {
    pub fn new(context: SessionContext<R>) -> Self {
        Self(Arc::new(Mutex::new(context)))
    }

    /// Exclusive access to the session context
    pub async fn lock(&self) -> MutexGuard<'_, SessionContext<R>> {
        self.0.lock().await
    }
}

impl<R, S> FromRequestParts<S> for CurrentSession<R>
where
    R: RepositoryProvider,
    S: Send + Sync,
{
    type Rejection = SessionLayerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession<R>>()
            .cloned()
            .ok_or(SessionLayerError::MissingLayer)
    }
}

/// Client address as seen by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
}

impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|addr| addr.ip().to_string());

        Ok(ConnectionInfo { ip })
    }
}
