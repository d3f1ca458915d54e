//! E2E tests for the greeting route and basic server functionality

mod common;

use common::{CLIENT_ORIGIN, TestServer};

#[tokio::test]
async fn test_root_greets() {
    let server = TestServer::new().await;

    let response = server.client.get(&server.url("/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "Hello World");
}

#[tokio::test]
async fn test_cors_allows_client_origin_with_credentials() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/getuser"))
        .header("Origin", CLIENT_ORIGIN)
        .send()
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some(CLIENT_ORIGIN)
    );
    assert_eq!(
        headers
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn test_cors_ignores_other_origins() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/"))
        .header("Origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_requires_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_login_page_lists_configured_providers() {
    let server = TestServer::with_providers(&[gatehouse::data::Provider::GitHub]).await;

    let response = server.client.get(&server.url("/login")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"href="/auth/github""#));
    assert!(!body.contains(r#"href="/auth/google""#));
}
