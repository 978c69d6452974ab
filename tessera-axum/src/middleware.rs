use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, Method, header, uri::Scheme},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera::{CookieJar, RequestContext, Tessera};
use tessera_core::RepositoryProvider;

use crate::{
    cookies::append_set_cookies,
    error::SessionLayerError,
    extractors::{ConnectionInfo, CurrentSession},
};

pub struct SessionState<R: RepositoryProvider> {
    pub tessera: Arc<Tessera<R>>,
}

impl<R: RepositoryProvider> Clone for SessionState<R> {
    fn clone(&self) -> Self {
        Self {
            tessera: self.tessera.clone(),
        }
    }
}

/// Describe the incoming request to the session manager
pub fn request_context(request: &Request, connection: ConnectionInfo) -> RequestContext {
    let headers = request.headers();

    let mut context = if is_websocket_upgrade(headers) {
        RequestContext::socket()
    } else {
        RequestContext::http()
    };
    if let Some(ip) = connection.ip {
        context = context.with_client_ip(ip);
    }

    let encrypted = request.uri().scheme() == Some(&Scheme::HTTPS)
        || headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    context
        .with_encrypted(encrypted)
        .with_preflight(request.method() == Method::OPTIONS)
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Start the request's session, run the handler, then commit and emit cookies.
///
/// Handlers reach the session through the [`CurrentSession`] extractor.
pub async fn session_middleware<R>(
    State(state): State<SessionState<R>>,
    connection: ConnectionInfo,
    inbound: axum_extra::extract::CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    R: RepositoryProvider,
{
    let context = request_context(&request, connection);
    let jar = CookieJar::from_inbound(
        inbound
            .iter()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string())),
    );

    let mut session = state.tessera.begin(context, jar);
    if let Err(e) = session.instance().await {
        tracing::error!(error = %e, "Failed to start session");
        return SessionLayerError::from(e).into_response();
    }

    let current = CurrentSession::new(session);
    request.extensions_mut().insert(current.clone());

    let mut response = next.run(request).await;

    let mut session = current.lock().await;
    if let Err(e) = session.commit().await {
        tracing::error!(error = %e, "Failed to commit session");
        return SessionLayerError::from(e).into_response();
    }
    append_set_cookies(response.headers_mut(), session.take_cookies());

    response
}

/// Install the session middleware on a router
pub trait SessionRouterExt {
    fn session_layer<R: RepositoryProvider>(self, tessera: Arc<Tessera<R>>) -> Self;
}

impl<S> SessionRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn session_layer<R: RepositoryProvider>(self, tessera: Arc<Tessera<R>>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            SessionState { tessera },
            session_middleware::<R>,
        ))
    }
}
