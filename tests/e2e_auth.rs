//! E2E tests for provider sign-in
//!
//! Covers:
//! - Handshake start and pending-state cookie
//! - Callback success and failure redirects
//! - Find-or-create of identities across logins

mod common;

use common::{CLIENT_ORIGIN, STUB_STATE, TestServer, cookie_value, location};
use gatehouse::data::Provider;

#[tokio::test]
async fn test_begin_redirects_to_provider_with_pending_cookie() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/auth/google"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let target = location(&response).unwrap();
    assert!(target.starts_with("https://google.provider.test/authorize"));
    assert!(target.contains(&format!("state={STUB_STATE}")));
    assert!(target.contains(&urlencoding::encode("http://localhost:4000/auth/google/callback").into_owned()));

    let set_cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("oauth_pending_google="))
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/auth"));
}

#[tokio::test]
async fn test_unconfigured_provider_is_not_found() {
    let server = TestServer::with_providers(&[Provider::Google]).await;

    let response = server
        .client
        .get(&server.url("/auth/twitter"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .client
        .get(&server.url("/auth/twitter/callback"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_callback_without_pending_cookie_redirects_to_failure_page() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/auth/google/callback"))
        .query(&[("code", "g-123:Ada"), ("state", STUB_STATE)])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(cookie_value(&response, "session").is_none());
    assert_eq!(server.state.db.count_identities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_callback_with_forged_state_redirects_to_failure_page() {
    let server = TestServer::new().await;
    let pending = server.begin(Provider::GitHub).await;

    let response = server
        .client
        .get(&server.url("/auth/github/callback"))
        .query(&[("code", "gh-1:octo"), ("state", "forged")])
        .header("Cookie", format!("oauth_pending_github={pending}"))
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn test_pending_cookie_is_bound_to_its_provider() {
    let server = TestServer::new().await;
    let pending = server.begin(Provider::Google).await;

    let response = server
        .client
        .get(&server.url("/auth/github/callback"))
        .query(&[("code", "gh-1:octo"), ("state", STUB_STATE)])
        .header("Cookie", format!("oauth_pending_github={pending}"))
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_provider_rejection_redirects_to_failure_page() {
    let server = TestServer::new().await;

    let response = server.login(Provider::Twitter, "fail").await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(cookie_value(&response, "session").is_none());
    assert_eq!(server.state.db.count_identities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_google_login_then_relogin_keeps_identity() {
    let server = TestServer::new().await;

    // First sign-in creates the record and starts a session
    let response = server.login(Provider::Google, "g-123:Ada").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response).as_deref(), Some(CLIENT_ORIGIN));
    let session = cookie_value(&response, "session").unwrap();

    let first: serde_json::Value = server
        .get_user(Some(&session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["displayName"], "Ada");
    assert_eq!(first["googleId"], "g-123");
    assert!(first.get("twitterId").is_none());

    // The provider now reports a different name; the stored one wins
    let second_session = server.login_session(Provider::Google, "g-123:Ada Lovelace").await;
    assert_ne!(second_session, session);

    let second: serde_json::Value = server
        .get_user(Some(&second_session))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["displayName"], "Ada");

    assert_eq!(server.state.db.count_identities().await.unwrap(), 1);
}

#[tokio::test]
async fn test_same_external_id_on_other_providers_is_a_separate_identity() {
    let server = TestServer::new().await;

    let twitter = server.login_session(Provider::Twitter, "42:jack").await;
    let github = server.login_session(Provider::GitHub, "42:octocat").await;

    let twitter: serde_json::Value = server.get_user(Some(&twitter)).await.json().await.unwrap();
    let github: serde_json::Value = server.get_user(Some(&github)).await.json().await.unwrap();

    assert_ne!(twitter["id"], github["id"]);
    assert_eq!(twitter["twitterId"], "42");
    assert_eq!(twitter["displayName"], "jack");
    assert_eq!(github["githubId"], "42");
    assert_eq!(github["displayName"], "octocat");
    assert_eq!(server.state.db.count_identities().await.unwrap(), 2);
}

#[tokio::test]
async fn test_callback_clears_pending_cookie() {
    let server = TestServer::new().await;

    let response = server.login(Provider::GitHub, "gh-7:octo").await;

    let cleared = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("oauth_pending_github=;"));
    assert!(cleared);
}

#[tokio::test]
async fn test_callback_with_unparsable_query_redirects_to_failure_page() {
    let server = TestServer::new().await;
    let pending = server.begin(Provider::Google).await;

    let response = server
        .client
        .get(&server.url("/auth/google/callback?code=g-1:Ada&state=stub-state&state=again"))
        .header("Cookie", format!("oauth_pending_google={pending}"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn test_store_failure_during_callback_redirects_to_failure_page() {
    let server = TestServer::new().await;
    server.execute_raw("DROP TABLE identities").await;

    let response = server.login(Provider::GitHub, "gh-1:octo").await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(cookie_value(&response, "session").is_none());
}
