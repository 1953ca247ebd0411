use chrono::{Duration as ChronoDuration, Utc};
use creator_portal::{
    AppConfig, AppState, InMemoryRepository, InMemorySessionStore, NoopNotifier, create_router,
    auth::Tier,
    notify::NotifierState,
    repository::RepositoryState,
    session::{FailingSessionStore, SessionRecord, SessionState, SessionStore},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub sessions: SessionState,
}

async fn spawn_app_with_sessions(sessions: SessionState) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let notifier = Arc::new(NoopNotifier) as NotifierState;

    let state = AppState::new(repo, sessions.clone(), notifier, AppConfig::default());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, sessions }
}

async fn spawn_app() -> TestApp {
    spawn_app_with_sessions(Arc::new(InMemorySessionStore::new()) as SessionState).await
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_member_login_unlocks_members_area() {
    let app = spawn_app().await;
    let client = client();

    // Locked while anonymous.
    let resp = client
        .get(format!("{}/nsfw", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/nsfw/login", app.address))
        .json(&serde_json::json!({
            "password": "member-test-password",
            "age_confirmed": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/nsfw", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_member_login_requires_age_confirmation() {
    let app = spawn_app().await;

    let resp = client()
        .post(format!("{}/nsfw/login", app.address))
        .json(&serde_json::json!({ "password": "member-test-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "You must confirm you are 18 or older.");
}

#[tokio::test]
async fn test_wrong_password_is_generic() {
    let app = spawn_app().await;

    let resp = client()
        .post(format!("{}/admin/login", app.address))
        .json(&serde_json::json!({ "password": "guessing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid password.");
}

#[tokio::test]
async fn test_tiers_are_disjoint() {
    let app = spawn_app().await;

    // A member session does not satisfy the admin guard.
    let member = client();
    let resp = member
        .post(format!("{}/nsfw/login", app.address))
        .json(&serde_json::json!({
            "password": "member-test-password",
            "age_confirmed": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = member
        .get(format!("{}/api/admin/contacts", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // And an admin session does not satisfy the member guard.
    let admin = client();
    let resp = admin
        .post(format!("{}/admin/login", app.address))
        .json(&serde_json::json!({ "password": "admin-test-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = admin
        .get(format!("{}/nsfw", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_anonymous_browser_navigation_is_redirected_to_login() {
    let app = spawn_app().await;
    let client = client();

    let resp = client
        .get(format!("{}/nsfw", app.address))
        .header("sec-fetch-mode", "navigate")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers()["location"], "/nsfw/login");

    let resp = client
        .get(format!("{}/api/admin/stats", app.address))
        .header("accept", "text/html,application/xhtml+xml")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers()["location"], "/admin/login");
}

#[tokio::test]
async fn test_anonymous_api_request_gets_bare_unauthorized() {
    let app = spawn_app().await;

    let resp = client()
        .get(format!("{}/api/admin/stats", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_deletes_session_and_clears_cookie() {
    let app = spawn_app().await;
    let client = client();

    client
        .post(format!("{}/nsfw/login", app.address))
        .json(&serde_json::json!({
            "password": "member-test-password",
            "age_confirmed": true
        }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/nsfw/logout", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/nsfw", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_valid_session_attaches_until_expiry() {
    let app = spawn_app().await;

    let record = SessionRecord::new(Tier::Member, "test".into());
    let token = record.token.clone();
    app.sessions
        .put(record, Duration::from_secs(60))
        .await
        .unwrap();

    let resp = client()
        .get(format!("{}/nsfw", app.address))
        .header("cookie", format!("portal_session={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_expired_session_resolves_anonymous_and_is_evicted() {
    let app = spawn_app().await;

    // A logically expired record the store still holds: eviction lag.
    let mut record = SessionRecord::new(Tier::Member, "test".into());
    record.expires_at = Utc::now() - ChronoDuration::seconds(2);
    let token = record.token.clone();
    app.sessions
        .put(record, Duration::from_secs(60))
        .await
        .unwrap();

    let resp = client()
        .get(format!("{}/nsfw", app.address))
        .header("cookie", format!("portal_session={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The resolver deleted the record on first observation.
    assert_eq!(app.sessions.get(&token).await.unwrap(), None);
}

#[tokio::test]
async fn test_session_store_outage_fails_open_for_resolution() {
    let app = spawn_app_with_sessions(Arc::new(FailingSessionStore) as SessionState).await;

    // Resolution degrades to anonymous rather than failing the request.
    let resp = client()
        .get(format!("{}/api/status", app.address))
        .header("cookie", "portal_session=whatever")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["session"]["active"], false);
}

#[tokio::test]
async fn test_session_store_outage_fails_closed_for_login() {
    let app = spawn_app_with_sessions(Arc::new(FailingSessionStore) as SessionState).await;

    let resp = client()
        .post(format!("{}/admin/login", app.address))
        .json(&serde_json::json!({ "password": "admin-test-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn test_login_throttle_trips_after_repeated_failures() {
    let app = spawn_app().await;
    let client = client();

    for _ in 0..5 {
        let resp = client
            .post(format!("{}/admin/login", app.address))
            .json(&serde_json::json!({ "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    // The window is spent: even the correct password is rejected now.
    let resp = client
        .post(format!("{}/admin/login", app.address))
        .json(&serde_json::json!({ "password": "admin-test-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
}

#[tokio::test]
async fn test_status_reports_active_session_tier() {
    let app = spawn_app().await;
    let client = client();

    client
        .post(format!("{}/admin/login", app.address))
        .json(&serde_json::json!({ "password": "admin-test-password" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("{}/api/status", app.address))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["session"]["active"], true);
    assert_eq!(body["session"]["tier"], "administrator");
}
