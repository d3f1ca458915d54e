//! E2E tests for session restore and logout

mod common;

use common::{TestServer, cookie_value};
use gatehouse::data::Provider;

#[tokio::test]
async fn test_getuser_without_session_is_empty() {
    let server = TestServer::new().await;

    let response = server.get_user(None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_getuser_with_tampered_cookie_is_empty() {
    let server = TestServer::new().await;
    let session = server.login_session(Provider::Google, "g-1:Grace").await;

    let mut tampered = session.clone();
    tampered.push('A');

    let response = server.get_user(Some(&tampered)).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_getuser_accepts_bearer_token() {
    let server = TestServer::new().await;
    let session = server.login_session(Provider::GitHub, "gh-9:hopper").await;

    let response = server
        .client
        .get(&server.url("/getuser"))
        .header("Authorization", format!("Bearer {session}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let user: serde_json::Value = response.json().await.unwrap();
    assert_eq!(user["githubId"], "gh-9");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let server = TestServer::new().await;
    let session = server.login_session(Provider::Google, "g-123:Ada").await;

    let response = server
        .client
        .get(&server.url("/auth/logout"))
        .header("Cookie", format!("session={session}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let removed = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("session=;"));
    assert!(removed);
    assert!(cookie_value(&response, "session").is_none());
    assert_eq!(response.text().await.unwrap(), "done");

    // Replaying the old cookie no longer restores anyone
    let response = server.get_user(Some(&session)).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_logout_without_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/auth/logout"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "no active session");
}

#[tokio::test]
async fn test_logout_only_ends_its_own_session() {
    let server = TestServer::new().await;
    let first = server.login_session(Provider::Twitter, "7:jack").await;
    let second = server.login_session(Provider::Twitter, "7:jack").await;

    let response = server
        .client
        .get(&server.url("/auth/logout"))
        .header("Cookie", format!("session={first}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "done");

    let user: serde_json::Value = server.get_user(Some(&second)).await.json().await.unwrap();
    assert_eq!(user["twitterId"], "7");
}

#[tokio::test]
async fn test_metrics_with_session() {
    let server = TestServer::new().await;
    let session = server.login_session(Provider::Google, "g-5:Lin").await;

    let response = server
        .client
        .get(&server.url("/metrics"))
        .header("Cookie", format!("session={session}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_getuser_store_failure_is_server_error() {
    let server = TestServer::new().await;
    let session = server.login_session(Provider::Google, "g-8:Barbara").await;

    server.execute_raw("DROP TABLE sessions").await;

    let response = server.get_user(Some(&session)).await;
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Database error");
}
