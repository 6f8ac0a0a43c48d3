//! End-to-end sign-in, anti-forgery and lockout flows against a live server.

use std::time::Duration;

use portfolio_guard::config::GuardConfig;
use portfolio_guard::observability::SecurityEventType;
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use serde_json::{json, Value};

mod common;
use common::{client, csrf_token, sign_in, spawn_server, test_config, PASSWORD, USERNAME};

fn post_body(title: &str, description: &str) -> Value {
    json!({
        "id": "post-1",
        "title": title,
        "description": description,
        "tags": ["rust", "security"],
    })
}

#[tokio::test]
async fn test_signin_issues_session_cookie() {
    let server = spawn_server(test_config()).await;

    let res = client()
        .post(server.url("/api/auth/signin"))
        .json(&json!({ "username": USERNAME, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let cookie = res.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("sessionId="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(server.events.events().is_empty());
}

#[tokio::test]
async fn test_csrf_endpoint_requires_session() {
    let server = spawn_server(test_config()).await;

    let res = client().get(server.url("/api/auth/csrf")).send().await.unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn test_content_submission_with_header_token() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;
    let token = csrf_token(&server, &session).await;
    assert_eq!(token.len(), 64);

    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Fish & Chips", "A plain description"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["title"], "Fish &amp; Chips");
    assert_eq!(body["tags"], json!(["rust", "security"]));

    // The same token a second time is refused.
    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Again", "replayed"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid or expired CSRF token");
    assert_eq!(server.events.count(SecurityEventType::CsrfViolation), 1);
}

#[tokio::test]
async fn test_content_submission_with_body_token() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;
    let token = csrf_token(&server, &session).await;

    let mut body = post_body("Hello", "World");
    body["_csrf"] = json!(token);

    let res = client()
        .put(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
}

#[tokio::test]
async fn test_missing_token_and_malformed_body() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;

    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .json(&post_body("Hello", "World"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "CSRF token missing");

    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Malformed request body");

    assert_eq!(server.events.count(SecurityEventType::CsrfViolation), 2);
}

#[tokio::test]
async fn test_token_from_other_session_is_refused() {
    let server = spawn_server(test_config()).await;
    let alice = sign_in(&server).await;
    let bob = sign_in(&server).await;
    let token = csrf_token(&server, &alice).await;

    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={bob}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Hello", "World"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_xss_and_sql_content_rejected() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;

    let token = csrf_token(&server, &session).await;
    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Hello", "<script>alert(document.cookie)</script>"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "description");

    let token = csrf_token(&server, &session).await;
    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("1' UNION SELECT password FROM users", "fine"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "title");

    assert_eq!(server.events.count(SecurityEventType::XssAttempt), 1);
    assert_eq!(server.events.count(SecurityEventType::SqlInjectionAttempt), 1);
}

#[tokio::test]
async fn test_signout_drops_tokens() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;
    let token = csrf_token(&server, &session).await;
    let signout_token = csrf_token(&server, &session).await;

    let res = client()
        .post(server.url("/api/auth/signout"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &signout_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()[SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Hello", "World"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_signout_requires_token() {
    let server = spawn_server(test_config()).await;
    let session = sign_in(&server).await;
    let token = csrf_token(&server, &session).await;

    let res = client()
        .post(server.url("/api/auth/signout"))
        .header(COOKIE, format!("sessionId={session}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(server.events.count(SecurityEventType::CsrfViolation), 1);

    // The session and its outstanding token survive the refused sign-out.
    let res = client()
        .post(server.url("/api/admin/content"))
        .header(COOKIE, format!("sessionId={session}"))
        .header("X-CSRF-Token", &token)
        .json(&post_body("Hello", "World"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
}

#[tokio::test]
async fn test_brute_force_lockout() {
    let server = spawn_server(test_config()).await;
    let client = client();

    for _ in 0..5 {
        let res = client
            .post(server.url("/api/auth/signin"))
            .json(&json!({ "username": USERNAME, "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);
    }
    assert_eq!(server.events.count(SecurityEventType::AuthFailure), 5);
    // Fifth failure crosses the threshold for both the user and the address.
    assert_eq!(server.events.count(SecurityEventType::SuspiciousActivity), 2);

    // Correct credentials are refused while flagged.
    let res = client
        .post(server.url("/api/auth/signin"))
        .json(&json!({ "username": USERNAME, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // So is another account from the same address.
    let res = client
        .post(server.url("/api/auth/signin"))
        .json(&json!({ "username": "editor", "password": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    assert_eq!(server.events.count(SecurityEventType::AuthFailure), 5);

    // Each refusal is recorded as well.
    let lockouts: Vec<_> = server
        .events
        .events()
        .into_iter()
        .filter(|e| e.event_type == SecurityEventType::SuspiciousActivity)
        .filter(|e| e.detail["reason"] == "locked_out")
        .collect();
    assert_eq!(lockouts.len(), 2);
    assert_eq!(lockouts[0].subject.as_deref(), Some("user:admin"));
    assert!(lockouts[1].subject.as_deref().unwrap().starts_with("ip:"));
}

#[tokio::test]
async fn test_injection_in_username_rejected() {
    let server = spawn_server(test_config()).await;

    let res = client()
        .post(server.url("/api/auth/signin"))
        .json(&json!({ "username": "admin' OR '1'='1", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "username");
    assert_eq!(server.events.count(SecurityEventType::SqlInjectionAttempt), 1);
    assert_eq!(server.events.count(SecurityEventType::AuthFailure), 0);
}

#[tokio::test]
async fn test_gate_reload_swaps_protected_prefixes() {
    let server = spawn_server(test_config()).await;

    let res = client().get(server.url("/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let mut config: GuardConfig = test_config();
    config.gate.protected_prefixes = vec!["/dashboard".to_string()];
    server.config_tx.send(config).unwrap();

    let mut challenged = None;
    for _ in 0..50 {
        let res = client().get(server.url("/dashboard")).send().await.unwrap();
        if res.status() == 307 {
            challenged = Some(res);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let res = challenged.expect("policy reload applied");
    assert_eq!(
        res.headers()[LOCATION],
        "/auth/signin?callbackUrl=%2Fdashboard"
    );
}
