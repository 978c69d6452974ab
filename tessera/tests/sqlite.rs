use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tessera::{
    CleanupConfig, CookieJar, DUMMY_COOKIE_CONTENT, Identity, RequestContext,
    SqliteRepositoryProvider, Tessera, TesseraBuilder, User, UserId,
};

async fn setup() -> Tessera<SqliteRepositoryProvider> {
    let _ = tracing_subscriber::fmt().try_init();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    TesseraBuilder::new()
        .with_sqlite_pool(pool)
        .apply_migrations(true)
        .build()
        .await
        .unwrap()
}

/// Play one request and return the cookies it set
async fn request(
    tessera: &Tessera<SqliteRepositoryProvider>,
    cookie: Option<&str>,
    ip: &str,
) -> Vec<tessera::SetCookie> {
    let jar = match cookie {
        Some(value) => CookieJar::from_inbound([("GDO6", value)]),
        None => CookieJar::new(),
    };
    let mut session = tessera.begin(RequestContext::http().with_client_ip(ip), jar);
    let visits: u32 = session.get("visits", 0).await.unwrap();
    session.set("visits", visits + 1).await.unwrap();
    session.commit().await.unwrap();
    session.take_cookies()
}

#[tokio::test]
async fn test_cookie_bootstrap_over_sqlite() {
    let tessera = setup().await;

    // First contact: only the probe cookie
    let cookies = request(&tessera, None, "10.0.0.1").await;
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value, DUMMY_COOKIE_CONTENT);

    // The client echoes the probe and gets a session
    let cookies = request(&tessera, Some(DUMMY_COOKIE_CONTENT), "10.0.0.1").await;
    assert_eq!(cookies.len(), 1);
    let session_cookie = cookies[0].value.clone();
    assert_ne!(session_cookie, DUMMY_COOKIE_CONTENT);

    // Returning with the session cookie sets nothing and sees the stored data
    let cookies = request(&tessera, Some(&session_cookie), "10.0.0.1").await;
    assert!(cookies.is_empty());

    let mut session = tessera.begin(
        RequestContext::http().with_client_ip("10.0.0.1"),
        CookieJar::from_inbound([("GDO6", session_cookie.as_str())]),
    );
    assert_eq!(session.get("visits", 0u32).await.unwrap(), 2);
}

#[tokio::test]
async fn test_pinned_session_rejects_other_ip() {
    let tessera = setup().await;
    let cookies = request(&tessera, Some(DUMMY_COOKIE_CONTENT), "10.0.0.1").await;
    let session_cookie = cookies[0].value.clone();

    let cookies = request(&tessera, Some(&session_cookie), "10.0.0.2").await;
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].is_dummy());
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let tessera = setup().await;
    let cookies = request(&tessera, Some(DUMMY_COOKIE_CONTENT), "10.0.0.1").await;
    let (id, _) = cookies[0].value.split_once('-').unwrap();

    let forged = format!("{id}-not-the-token");
    let cookies = request(&tessera, Some(&forged), "10.0.0.1").await;
    assert!(cookies[0].is_dummy());
}

#[tokio::test]
async fn test_login_survives_requests() {
    let tessera = setup().await;
    let user = tessera
        .create_user(
            User::builder()
                .id(UserId::new_random())
                .name(Some("gizmore".to_string()))
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    let mut session = tessera.begin(
        RequestContext::http(),
        CookieJar::from_inbound([("GDO6", DUMMY_COOKIE_CONTENT)]),
    );
    session.bind_user(user.clone()).await.unwrap();
    session.commit().await.unwrap();
    let value = session.take_cookies()[0].value.clone();

    let mut session = tessera.begin(
        RequestContext::http(),
        CookieJar::from_inbound([("GDO6", value.as_str())]),
    );
    assert_eq!(session.user().await.unwrap(), Identity::User(user));
    assert!(!session.current_user().is_ghost());
}

#[tokio::test]
async fn test_background_session_is_persisted() {
    let tessera = setup().await;
    let mut session = tessera.begin(RequestContext::background(), CookieJar::new());
    session.set("job", "reindex").await.unwrap();
    session.commit().await.unwrap();

    let value = session.cookie_value().unwrap().to_string();
    let mut reloaded = tessera.begin(
        RequestContext::http(),
        CookieJar::from_inbound([("GDO6", value.as_str())]),
    );
    assert_eq!(
        reloaded.get("job", String::new()).await.unwrap(),
        "reindex"
    );
}

#[tokio::test]
async fn test_cleanup_keeps_active_sessions() {
    let tessera = setup()
        .await
        .with_cleanup_config(CleanupConfig::default().with_retention(Duration::from_secs(3600)));

    let old = RequestContext::http().at(chrono::Utc::now() - chrono::Duration::hours(3));
    let mut stale = tessera.begin(old, CookieJar::from_inbound([("GDO6", DUMMY_COOKIE_CONTENT)]));
    let stale_value = stale.instance().await.unwrap().unwrap().cookie_value();

    request(&tessera, Some(DUMMY_COOKIE_CONTENT), "10.0.0.1").await;

    assert_eq!(tessera.cleanup_sessions().await.unwrap(), 1);

    let cookies = request(&tessera, Some(&stale_value), "10.0.0.1").await;
    assert!(cookies[0].is_dummy());
}
