//! Request-scoped session lifecycle
//!
//! [`SessionManager`] is shared by all requests and owns the storage handles, configuration,
//! lookup cache and lock registry. Each request gets its own [`SessionContext`] from
//! [`SessionManager::context`]; the context resolves at most one session, lazily, on the
//! first call that needs it.
//!
//! # Start protocol
//!
//! 1. While the application is installing there is no session.
//! 2. Background runs have no cookie channel: a session is created and immediately reloaded
//!    through the cookie path.
//! 3. Otherwise the inbound cookie decides:
//!    - absent: the dummy cookie is sent and the request runs without a session
//!    - the dummy value: the client accepts cookies, so a new session is created
//!    - anything else: the value is validated and the session reloaded. A rejected cookie
//!      is logged and answered with the dummy cookie.
//!
//! Storage failures always propagate.
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Error,
    config::SessionConfig,
    context::RequestContext,
    cookie::{CookieJar, DUMMY_COOKIE_CONTENT, SetCookie, parse_cookie_value},
    error::SessionError,
    repositories::{
        RepositoryProvider, SessionCache, SessionRepository, SessionRepositoryProvider,
        UserRepository, UserRepositoryProvider,
    },
    services::lock::{LockRegistry, SessionLock},
    session::{NewSession, Session, SessionId},
    user::{Identity, User},
};

/// Shared entry point for session handling.
pub struct SessionManager<R: RepositoryProvider> {
    repositories: Arc<R>,
    config: Arc<SessionConfig>,
    locks: LockRegistry,
    cache: Option<SessionCache>,
}

impl<R: RepositoryProvider> Clone for SessionManager<R> {
    fn clone(&self) -> Self {
        Self {
            repositories: Arc::clone(&self.repositories),
            config: Arc::clone(&self.config),
            locks: self.locks.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<R: RepositoryProvider> SessionManager<R> {
    pub fn new(repositories: Arc<R>, config: SessionConfig) -> Self {
        let cache = config.cache_lookups.then(SessionCache::new);
        Self {
            repositories,
            config: Arc::new(config),
            locks: LockRegistry::new(),
            cache,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// The lookup cache, when `cache_lookups` is enabled
    pub fn cache(&self) -> Option<&SessionCache> {
        self.cache.as_ref()
    }

    /// Open the session context of one request
    pub fn context(&self, request: RequestContext, jar: CookieJar) -> SessionContext<R> {
        SessionContext::new(self.clone(), request, jar)
    }

    async fn find(&self, id: SessionId) -> Result<Option<Session>, Error> {
        if let Some(session) = self.cache.as_ref().and_then(|cache| cache.get(id)) {
            tracing::trace!(session_id = %id, "Session cache hit");
            return Ok(Some(session));
        }
        let session = self.repositories.session().find(id).await?;
        if let (Some(cache), Some(session)) = (&self.cache, &session) {
            cache.put(session);
        }
        Ok(session)
    }

    async fn insert(&self, session: NewSession) -> Result<Session, Error> {
        let session = self.repositories.session().insert(session).await?;
        if let Some(cache) = &self.cache {
            cache.put(&session);
        }
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        if let Err(e) = self.repositories.session().save(session).await {
            if let Some(cache) = &self.cache {
                cache.evict(session.id);
            }
            return Err(e);
        }
        if let Some(cache) = &self.cache {
            cache.put(session);
        }
        Ok(())
    }
}

/// Session state of a single request.
///
/// Never share a context between requests. Dropping it releases the session lock, if held.
pub struct SessionContext<R: RepositoryProvider> {
    manager: SessionManager<R>,
    request: RequestContext,
    jar: CookieJar,
    current: Option<Session>,
    bound_user: Option<User>,
    current_user: Identity,
    started: bool,
    lock: Option<SessionLock>,
}

impl<R: RepositoryProvider> SessionContext<R> {
    pub fn new(manager: SessionManager<R>, request: RequestContext, jar: CookieJar) -> Self {
        Self {
            manager,
            request,
            jar,
            current: None,
            bound_user: None,
            current_user: Identity::Ghost,
            started: false,
            lock: None,
        }
    }

    /// The current session, starting one on the first call.
    ///
    /// Start is attempted only once: after a failed attempt this returns `None` until
    /// [`reset`](Self::reset).
    pub async fn instance(&mut self) -> Result<Option<&Session>, Error> {
        self.ensure_started().await?;
        Ok(self.current.as_ref())
    }

    async fn instance_mut(&mut self) -> Result<Option<&mut Session>, Error> {
        self.ensure_started().await?;
        Ok(self.current.as_mut())
    }

    async fn ensure_started(&mut self) -> Result<(), Error> {
        if !self.started {
            self.started = true;
            self.start().await?;
        }
        Ok(())
    }

    /// The current session without attempting a start
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Forget the current session so the next [`instance`](Self::instance) starts afresh
    pub fn reset(&mut self) {
        self.current = None;
        self.started = false;
        self.bound_user = None;
        self.current_user = Identity::Ghost;
        self.lock = None;
    }

    /// The user bound to the session, or the ghost
    pub async fn user(&mut self) -> Result<Identity, Error> {
        self.ensure_started().await?;
        Ok(Identity::from(self.bound_user.clone()))
    }

    /// Who the request acts as. Background runs never change it.
    pub fn current_user(&self) -> &Identity {
        &self.current_user
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    /// Drain the outbound cookie instructions
    pub fn take_cookies(&mut self) -> Vec<SetCookie> {
        self.jar.take_outbound()
    }

    /// Cookie name for this request's transport
    pub fn cookie_name(&self) -> String {
        self.manager.config.cookie_name_for(self.request.encrypted)
    }

    /// The inbound value of the session cookie
    pub fn cookie_value(&self) -> Option<&str> {
        self.jar.get(&self.cookie_name())
    }

    async fn start(&mut self) -> Result<(), Error> {
        if self.request.installing {
            tracing::debug!("Sessions disabled while installing");
            return Ok(());
        }

        if self.request.mode.is_background() {
            let value = self.create_session().await?.cookie_value();
            return self.reload_or_dummy(&value).await;
        }

        match self.cookie_value().map(str::to_owned) {
            None => {
                self.set_dummy_cookie();
                Ok(())
            }
            Some(value) if value == DUMMY_COOKIE_CONTENT => {
                self.create_session().await?;
                Ok(())
            }
            Some(value) => self.reload_or_dummy(&value).await,
        }
    }

    async fn reload_or_dummy(&mut self, value: &str) -> Result<(), Error> {
        let reloaded = self.reload_cookie(value).await.map(|_| ());
        match reloaded {
            Ok(()) => Ok(()),
            Err(e) if e.is_rejection() => {
                self.set_dummy_cookie();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Validate a `"<id>-<token>"` cookie value and make its session current.
    ///
    /// Checks run in order: format, row exists, token, then the stored IP if there is one.
    pub async fn reload_cookie(&mut self, value: &str) -> Result<&Session, Error> {
        let (id, token) = parse_cookie_value(value).map_err(|e| self.reject(e))?;

        let Some(session) = self.manager.find(id).await? else {
            return Err(self.reject(SessionError::UnknownSession(id)));
        };

        if !session.token.verify(token) {
            return Err(self.reject(SessionError::TokenMismatch));
        }

        if let Some(stored) = session.ip_address.as_deref() {
            let observed = self.request.client_ip.as_deref().unwrap_or_default();
            if stored != observed {
                return Err(self.reject(SessionError::IpMismatch {
                    stored: stored.to_string(),
                    observed: observed.to_string(),
                }));
            }
        }

        self.bind(session).await
    }

    /// Load a session by id alone, for callers that authenticated the client otherwise
    pub async fn reload_id(&mut self, id: SessionId) -> Result<&Session, Error> {
        match self.manager.find(id).await? {
            Some(session) => self.bind(session).await,
            None => Err(self.reject(SessionError::UnknownSession(id))),
        }
    }

    fn reject(&self, error: SessionError) -> Error {
        tracing::warn!(
            error = %error,
            mode = ?self.request.mode,
            client_ip = self.request.client_ip.as_deref().unwrap_or("-"),
            "Rejected session cookie"
        );
        error.into()
    }

    async fn bind(&mut self, mut session: Session) -> Result<&Session, Error> {
        session.touch(self.request.now);
        let user = self.resolve_user(&session).await?;

        if !self.request.mode.is_background() {
            self.current_user = Identity::from(user.clone());
        }
        if self
            .lock
            .as_ref()
            .is_some_and(|lock| lock.session_id() != session.id)
        {
            self.lock = None;
        }
        self.bound_user = user;

        tracing::debug!(
            session_id = %session.id,
            user_id = session.user_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            "Session loaded"
        );
        Ok(&*self.current.insert(session))
    }

    async fn resolve_user(&self, session: &Session) -> Result<Option<User>, Error> {
        let Some(user_id) = session.user_id.as_ref() else {
            return Ok(None);
        };
        let user = self.manager.repositories.user().find_by_id(user_id).await?;
        if user.is_none() {
            tracing::warn!(
                session_id = %session.id,
                user_id = %user_id,
                "Session is bound to a missing user"
            );
        }
        Ok(user)
    }

    async fn create_session(&mut self) -> Result<&Session, Error> {
        let ip_address = if self.manager.config.ip_pinning {
            self.request.client_ip.clone()
        } else {
            None
        };
        let session = self
            .manager
            .insert(NewSession::new(self.request.now).with_ip_address(ip_address))
            .await?;
        tracing::info!(session_id = %session.id, mode = ?self.request.mode, "Created session");

        self.set_session_cookie(&session);
        self.bound_user = None;
        if !self.request.mode.is_background() {
            self.current_user = Identity::Ghost;
        }
        self.lock = None;
        Ok(&*self.current.insert(session))
    }

    fn set_session_cookie(&mut self, session: &Session) {
        let value = session.cookie_value();
        if self.request.sends_cookies() {
            self.jar.push(SetCookie::session(
                &self.manager.config,
                self.request.encrypted,
                value,
                self.request.now,
            ));
        } else if !self.request.mode.emits_cookies() {
            let name = self.cookie_name();
            self.jar.reflect(name, value);
        }
    }

    fn set_dummy_cookie(&mut self) {
        if self.request.sends_cookies() {
            self.jar.push(SetCookie::dummy(
                &self.manager.config,
                self.request.encrypted,
                self.request.now,
            ));
        }
    }

    /// Read `key`, or `default` when there is no session or no such key
    pub async fn get<T: DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T, Error> {
        match self.instance().await? {
            Some(session) => Ok(session.data.get(key)?.unwrap_or(default)),
            None => Ok(default),
        }
    }

    pub async fn get_value(&mut self, key: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .instance()
            .await?
            .and_then(|session| session.data.get_value(key).cloned()))
    }

    /// Store `value` under `key`. Without a session this does nothing.
    pub async fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), Error> {
        if let Some(session) = self.instance_mut().await? {
            session.data.insert(key, value)?;
        }
        Ok(())
    }

    pub async fn remove(&mut self, key: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .instance_mut()
            .await?
            .and_then(|session| session.data.remove(key)))
    }

    /// Persist the current session, if any. Never starts one.
    pub async fn commit(&mut self) -> Result<(), Error> {
        let Some(session) = self.current.as_mut() else {
            return Ok(());
        };
        session.touch(self.request.now);
        self.manager.save(session).await?;
        tracing::debug!(session_id = %session.id, "Committed session");
        Ok(())
    }

    /// Sign `user` in on the current session
    pub async fn bind_user(&mut self, user: User) -> Result<(), Error> {
        let background = self.request.mode.is_background();
        let Some(session) = self.instance_mut().await? else {
            return Err(SessionError::NoSession.into());
        };
        session.user_id = Some(user.id.clone());
        tracing::info!(session_id = %session.id, user_id = %user.id, "Bound user to session");

        if !background {
            self.current_user = Identity::User(user.clone());
        }
        self.bound_user = Some(user);
        Ok(())
    }

    /// Sign out, keeping the session and its data
    pub async fn unbind_user(&mut self) -> Result<(), Error> {
        let background = self.request.mode.is_background();
        if let Some(session) = self.instance_mut().await? {
            session.user_id = None;
            self.bound_user = None;
            if !background {
                self.current_user = Identity::Ghost;
            }
        }
        Ok(())
    }

    pub async fn set_last_url(&mut self, url: impl Into<String>) -> Result<(), Error> {
        if let Some(session) = self.instance_mut().await? {
            session.last_url = Some(url.into());
        }
        Ok(())
    }

    pub fn last_url(&self) -> Option<&str> {
        self.current.as_ref()?.last_url.as_deref()
    }

    /// Take the exclusive lock of the current session, waiting for other holders.
    ///
    /// Returns `false` when there is no session to lock.
    pub async fn lock(&mut self) -> Result<bool, Error> {
        if self.lock.is_some() {
            return Ok(true);
        }
        let Some(id) = self.instance().await?.map(|session| session.id) else {
            return Ok(false);
        };
        self.lock = Some(self.manager.locks.acquire(id).await);
        Ok(true)
    }

    /// Release the session lock; returns whether one was held
    pub fn unlock(&mut self) -> bool {
        self.lock.take().is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::{
        config::SessionConfig,
        cookie::DUMMY_COOKIE_EXPIRES,
        repositories::MemoryRepositoryProvider,
        session::SessionToken,
        user::UserId,
    };

    type Manager = SessionManager<MemoryRepositoryProvider>;

    fn setup(config: SessionConfig) -> (Arc<MemoryRepositoryProvider>, Manager) {
        let _ = tracing_subscriber::fmt().try_init();
        let repositories = Arc::new(MemoryRepositoryProvider::new());
        let manager = SessionManager::new(Arc::clone(&repositories), config);
        (repositories, manager)
    }

    fn stored_session(
        repositories: &MemoryRepositoryProvider,
        id: i64,
        token: &str,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Session {
        let mut session = NewSession::new(now)
            .with_ip_address(ip.map(str::to_string))
            .into_session(SessionId::new(id));
        session.token = SessionToken::new(token);
        repositories.session().put(session.clone());
        session
    }

    fn http_with_cookie(value: &str) -> CookieJar {
        CookieJar::from_inbound([("GDO6", value)])
    }

    #[tokio::test]
    async fn test_no_cookie_sets_dummy() {
        let (repositories, manager) = setup(SessionConfig::default());
        let now = Utc::now();
        let mut context = manager.context(RequestContext::http().at(now), CookieJar::new());

        assert!(context.instance().await.unwrap().is_none());

        let cookies = context.take_cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, DUMMY_COOKIE_CONTENT);
        assert_eq!(cookies[0].name, "GDO6");
        assert_eq!(
            cookies[0].expires,
            Some(now + Duration::seconds(DUMMY_COOKIE_EXPIRES))
        );
        assert_eq!(repositories.session().inserts(), 0);
        assert!(repositories.session().is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_creates_session() {
        let (repositories, manager) = setup(SessionConfig::default());
        let now = Utc::now();
        let mut context = manager.context(
            RequestContext::http().with_client_ip("10.0.0.1").at(now),
            http_with_cookie(DUMMY_COOKIE_CONTENT),
        );

        let session = context.instance().await.unwrap().unwrap().clone();
        assert!(session.data.is_empty());
        assert!(session.is_anonymous());
        assert!(!session.token.is_empty());
        assert_eq!(session.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(session.created_at, now);

        let cookies = context.take_cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, session.cookie_value());
        assert_eq!(cookies[0].expires, Some(now + Duration::seconds(72_600)));
        assert_eq!(repositories.session().inserts(), 1);
        assert!(context.current_user().is_ghost());
    }

    #[tokio::test]
    async fn test_sentinel_without_ip_pinning() {
        let (_, manager) = setup(SessionConfig::default().with_ip_pinning(false));
        let mut context = manager.context(
            RequestContext::http().with_client_ip("10.0.0.1"),
            http_with_cookie(DUMMY_COOKIE_CONTENT),
        );
        let session = context.instance().await.unwrap().unwrap();
        assert_eq!(session.ip_address, None);
    }

    #[tokio::test]
    async fn test_fresh_tokens_per_session() {
        let (_, manager) = setup(SessionConfig::default());
        let mut first = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        let mut second = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        let a = first.instance().await.unwrap().unwrap().clone();
        let b = second.instance().await.unwrap().unwrap().clone();
        assert_ne!(a.id, b.id);
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_reload_without_stored_ip_ignores_client_ip() {
        let (_, manager) = setup(SessionConfig::default());
        let repositories = manager.repositories().clone();
        stored_session(&repositories, 42, "abc123", None, Utc::now());

        for ip in ["1.2.3.4", "5.6.7.8"] {
            let mut context = manager.context(
                RequestContext::http().with_client_ip(ip),
                http_with_cookie("42-abc123"),
            );
            let session = context.instance().await.unwrap().unwrap();
            assert_eq!(session.id, SessionId::new(42));
            assert!(context.take_cookies().is_empty());
        }
    }

    #[tokio::test]
    async fn test_reload_with_matching_ip() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", Some("1.2.3.4"), Utc::now());

        let mut context = manager.context(
            RequestContext::http().with_client_ip("1.2.3.4"),
            http_with_cookie("42-abc123"),
        );
        assert!(context.instance().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ip_mismatch_reissues_dummy() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", Some("1.2.3.4"), Utc::now());

        let mut context = manager.context(
            RequestContext::http().with_client_ip("5.6.7.8"),
            http_with_cookie("42-abc123"),
        );
        assert!(context.instance().await.unwrap().is_none());
        assert!(context.current().is_none());

        let cookies = context.take_cookies();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].is_dummy());
    }

    #[tokio::test]
    async fn test_rejected_cookies() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", None, Utc::now());

        for value in ["42abc123", "-abc123", "x-abc123", "43-abc123", "42-abc124", "42-"] {
            let mut context = manager.context(RequestContext::http(), http_with_cookie(value));
            assert!(
                context.instance().await.unwrap().is_none(),
                "{value:?} should be rejected"
            );
            let cookies = context.take_cookies();
            assert_eq!(cookies.len(), 1, "{value:?} should reissue the dummy cookie");
            assert!(cookies[0].is_dummy());
        }
    }

    #[tokio::test]
    async fn test_reload_cookie_reports_rejection_kind() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", Some("1.2.3.4"), Utc::now());
        let mut context = manager.context(
            RequestContext::http().with_client_ip("9.9.9.9"),
            CookieJar::new(),
        );

        let err = context.reload_cookie("nope").await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::MalformedCookie)));

        let err = context.reload_cookie("7-abc123").await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::UnknownSession(id)) if id == SessionId::new(7)));

        let err = context.reload_cookie("42-zzz").await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::TokenMismatch)));

        let err = context.reload_cookie("42-abc123").await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::IpMismatch { .. })));
        assert!(context.current().is_none());
    }

    #[tokio::test]
    async fn test_failed_start_is_not_retried() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));

        assert!(context.instance().await.unwrap().is_none());
        assert_eq!(repositories.session().finds(), 1);

        assert!(context.instance().await.unwrap().is_none());
        assert_eq!(context.get("key", 5).await.unwrap(), 5);
        assert_eq!(repositories.session().finds(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates_once() {
        let (repositories, manager) = setup(SessionConfig::default());
        repositories.session().set_unavailable(true);
        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));

        let err = context.instance().await.unwrap_err();
        assert!(err.is_storage_error());
        assert!(context.take_cookies().is_empty());

        assert!(context.instance().await.unwrap().is_none());
        assert_eq!(repositories.session().finds(), 1);
    }

    #[tokio::test]
    async fn test_reset_allows_fresh_start() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));

        assert!(context.instance().await.unwrap().is_none());
        stored_session(&repositories, 42, "abc123", None, Utc::now());
        assert!(context.instance().await.unwrap().is_none());

        context.reset();
        assert!(context.instance().await.unwrap().is_some());
        assert_eq!(repositories.session().finds(), 2);
    }

    #[tokio::test]
    async fn test_data_accessors() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));

        context.set("count", 3).await.unwrap();
        assert_eq!(context.get("count", 0).await.unwrap(), 3);
        assert_eq!(context.get_value("count").await.unwrap(), Some(Value::from(3)));

        assert_eq!(context.remove("count").await.unwrap(), Some(Value::from(3)));
        assert_eq!(context.get("count", 0).await.unwrap(), 0);
        assert_eq!(context.remove("count").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_without_session_is_dropped() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), CookieJar::new());

        context.set("theme", "dark").await.unwrap();
        assert_eq!(
            context.get("theme", "light".to_string()).await.unwrap(),
            "light"
        );
        context.commit().await.unwrap();
        assert_eq!(repositories.session().saves(), 0);
    }

    #[tokio::test]
    async fn test_commit_persists_data() {
        let (repositories, manager) = setup(SessionConfig::default());
        let start = Utc::now();
        stored_session(&repositories, 42, "abc123", None, start);

        let later = start + Duration::minutes(5);
        let mut context = manager.context(RequestContext::http().at(later), http_with_cookie("42-abc123"));
        context.set("cart", vec![1, 2, 3]).await.unwrap();
        context.set_last_url("/checkout").await.unwrap();

        assert!(repositories.session().peek(SessionId::new(42)).unwrap().data.is_empty());
        context.commit().await.unwrap();

        let row = repositories.session().peek(SessionId::new(42)).unwrap();
        assert_eq!(row.data.get::<Vec<i32>>("cart").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(row.last_url.as_deref(), Some("/checkout"));
        assert_eq!(row.last_activity, later);
        assert_eq!(row.created_at, start);
        assert_eq!(context.last_url(), Some("/checkout"));
    }

    #[tokio::test]
    async fn test_commit_does_not_start() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        context.commit().await.unwrap();
        assert_eq!(repositories.session().inserts(), 0);
        assert!(context.take_cookies().is_empty());
    }

    #[tokio::test]
    async fn test_installing_has_no_session() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(
            RequestContext::http().with_installing(true),
            http_with_cookie(DUMMY_COOKIE_CONTENT),
        );
        assert!(context.instance().await.unwrap().is_none());
        assert!(context.take_cookies().is_empty());
        assert_eq!(repositories.session().inserts(), 0);
    }

    #[tokio::test]
    async fn test_background_synthesizes_session() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::background(), CookieJar::new());

        let session = context.instance().await.unwrap().unwrap().clone();
        assert_eq!(repositories.session().inserts(), 1);
        assert_eq!(repositories.session().finds(), 1);
        assert!(context.take_cookies().is_empty());
        assert_eq!(context.cookie_value(), Some(session.cookie_value().as_str()));
    }

    #[tokio::test]
    async fn test_socket_reflects_new_cookie() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::socket(), http_with_cookie(DUMMY_COOKIE_CONTENT));

        let value = context.instance().await.unwrap().unwrap().cookie_value();
        assert!(context.take_cookies().is_empty());
        assert_eq!(context.cookie_value(), Some(value.as_str()));
    }

    #[tokio::test]
    async fn test_socket_without_cookie_sends_nothing() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::socket(), CookieJar::new());
        assert!(context.instance().await.unwrap().is_none());
        assert!(context.take_cookies().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_sends_no_cookies() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http().with_preflight(true), CookieJar::new());
        assert!(context.instance().await.unwrap().is_none());
        assert!(context.take_cookies().is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_uses_tls_cookie_name() {
        let (repositories, manager) = setup(SessionConfig::default().with_secure(true));
        stored_session(&repositories, 42, "abc123", None, Utc::now());

        let mut plain_name = manager.context(
            RequestContext::http().with_encrypted(true),
            http_with_cookie("42-abc123"),
        );
        assert!(plain_name.instance().await.unwrap().is_none());
        let cookies = plain_name.take_cookies();
        assert_eq!(cookies[0].name, "GDO6_tls");
        assert!(cookies[0].secure);

        let mut tls = manager.context(
            RequestContext::http().with_encrypted(true),
            CookieJar::from_inbound([("GDO6_tls", "42-abc123")]),
        );
        assert!(tls.instance().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_current_user_follows_bound_user() {
        let (repositories, manager) = setup(SessionConfig::default());
        let user = User::builder()
            .id(UserId::new("usr_1"))
            .name(Some("gizmore".to_string()))
            .build()
            .unwrap();
        repositories.user().create(user.clone()).await.unwrap();

        let mut session = stored_session(&repositories, 42, "abc123", None, Utc::now());
        session.user_id = Some(user.id.clone());
        repositories.session().put(session);

        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));
        assert_eq!(context.user().await.unwrap(), Identity::User(user.clone()));
        assert_eq!(context.current_user(), &Identity::User(user));
    }

    #[tokio::test]
    async fn test_background_reload_keeps_current_user() {
        let (repositories, manager) = setup(SessionConfig::default());
        let user = User::builder().id(UserId::new("usr_1")).build().unwrap();
        repositories.user().create(user.clone()).await.unwrap();

        let mut session = stored_session(&repositories, 42, "abc123", None, Utc::now());
        session.user_id = Some(user.id.clone());
        repositories.session().put(session);

        let mut context = manager.context(RequestContext::background(), CookieJar::new());
        context.reload_id(SessionId::new(42)).await.unwrap();

        assert!(context.current_user().is_ghost());
        assert_eq!(context.user().await.unwrap(), Identity::User(user));
    }

    #[tokio::test]
    async fn test_missing_user_is_ghost() {
        let (repositories, manager) = setup(SessionConfig::default());
        let mut session = stored_session(&repositories, 42, "abc123", None, Utc::now());
        session.user_id = Some(UserId::new("usr_gone"));
        repositories.session().put(session);

        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));
        assert!(context.user().await.unwrap().is_ghost());
    }

    #[tokio::test]
    async fn test_bind_and_unbind_user() {
        let (repositories, manager) = setup(SessionConfig::default());
        let user = User::builder().id(UserId::new("usr_1")).build().unwrap();
        repositories.user().create(user.clone()).await.unwrap();

        let mut context = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        context.bind_user(user.clone()).await.unwrap();
        assert_eq!(context.current_user(), &Identity::User(user.clone()));
        context.commit().await.unwrap();

        let id = context.current().unwrap().id;
        assert_eq!(
            repositories.session().peek(id).unwrap().user_id,
            Some(user.id.clone())
        );

        context.unbind_user().await.unwrap();
        assert!(context.current_user().is_ghost());
        context.commit().await.unwrap();
        assert_eq!(repositories.session().peek(id).unwrap().user_id, None);
    }

    #[tokio::test]
    async fn test_bind_user_without_session() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), CookieJar::new());
        let user = User::builder().id(UserId::new("usr_1")).build().unwrap();

        let err = context.bind_user(user).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NoSession)));
        assert!(context.current_user().is_ghost());
    }

    #[tokio::test]
    async fn test_reload_id() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", Some("1.2.3.4"), Utc::now());

        let mut context = manager.context(RequestContext::socket(), CookieJar::new());
        assert_eq!(
            context.reload_id(SessionId::new(42)).await.unwrap().id,
            SessionId::new(42)
        );
        assert!(context.reload_id(SessionId::new(43)).await.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let (repositories, manager) = setup(SessionConfig::default());
        stored_session(&repositories, 42, "abc123", None, Utc::now());
        let id = SessionId::new(42);

        {
            let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));
            assert!(context.lock().await.unwrap());
            assert!(context.is_locked());
            assert!(manager.locks().is_locked(id));
        }
        assert!(!manager.locks().is_locked(id));

        let mut context = manager.context(RequestContext::http(), http_with_cookie("42-abc123"));
        assert!(context.lock().await.unwrap());
        assert!(context.unlock());
        assert!(!context.unlock());
        assert!(!manager.locks().is_locked(id));

        assert!(context.lock().await.unwrap());
        context.reset();
        assert!(!manager.locks().is_locked(id));
    }

    #[tokio::test]
    async fn test_lock_without_session() {
        let (_, manager) = setup(SessionConfig::default());
        let mut context = manager.context(RequestContext::http(), CookieJar::new());
        assert!(!context.lock().await.unwrap());
        assert!(manager.locks().is_empty());
    }

    #[tokio::test]
    async fn test_cached_lookups() {
        let (repositories, manager) = setup(SessionConfig::default().with_cache_lookups(true));
        let mut first = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        let value = first.instance().await.unwrap().unwrap().cookie_value();
        first.set("seen", true).await.unwrap();
        first.commit().await.unwrap();

        let mut second = manager.context(RequestContext::http(), http_with_cookie(&value));
        assert!(second.get("seen", false).await.unwrap());
        assert_eq!(repositories.session().finds(), 0);
        assert_eq!(manager.cache().map(SessionCache::len), Some(1));
    }

    #[tokio::test]
    async fn test_uncached_lookups_hit_storage() {
        let (repositories, manager) = setup(SessionConfig::default());
        assert!(manager.cache().is_none());
        let mut first = manager.context(RequestContext::http(), http_with_cookie(DUMMY_COOKIE_CONTENT));
        let value = first.instance().await.unwrap().unwrap().cookie_value();

        let mut second = manager.context(RequestContext::http(), http_with_cookie(&value));
        assert!(second.instance().await.unwrap().is_some());
        assert_eq!(repositories.session().finds(), 1);
    }
}
