//! Gate and header behaviour, driven in-process through the layered router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use portfolio_guard::config::GuardConfig;
use portfolio_guard::http::HttpServer;
use portfolio_guard::observability::{MemorySink, SecurityEventType};
use tower::ServiceExt;

fn server(config: GuardConfig) -> (HttpServer, Arc<MemorySink>) {
    let events = Arc::new(MemorySink::new());
    (HttpServer::with_event_sink(config, events.clone()), events)
}

async fn send(server: &HttpServer, request: Request<Body>) -> Response<Body> {
    server.router().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_path_traversal_is_forbidden() {
    let (server, events) = server(GuardConfig::default());

    for uri in [
        "/../etc/passwd",
        "/static/..%2f..%2fetc/passwd",
        "/download?file=%2E%2E%2Fsecret",
    ] {
        let res = send(&server, get(uri)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(body_text(res).await, "Forbidden");
    }
    assert_eq!(events.count(SecurityEventType::PathTraversal), 3);
}

#[tokio::test]
async fn test_scanner_user_agent_is_forbidden() {
    let (server, events) = server(GuardConfig::default());

    let request = Request::builder()
        .uri("/")
        .header(header::USER_AGENT, "sqlmap/1.7.2#stable (https://sqlmap.org)")
        .body(Body::empty())
        .unwrap();
    let res = send(&server, request).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let recorded = events.events();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].event_type, SecurityEventType::ScannerBlocked);
    assert_eq!(recorded[0].detail["path"], "/");
}

#[tokio::test]
async fn test_rejection_beats_session() {
    let (server, _) = server(GuardConfig::default());

    let request = Request::builder()
        .uri("/admin/../admin")
        .header(header::COOKIE, "sessionId=abc")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&server, request).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_protected_path_without_session_is_challenged() {
    let (server, events) = server(GuardConfig::default());

    let res = send(&server, get("/admin?tab=posts")).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        res.headers()[header::LOCATION],
        "/auth/signin?callbackUrl=%2Fadmin%3Ftab%3Dposts"
    );
    assert!(res.headers().contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn test_protected_path_with_session_passes() {
    let (server, _) = server(GuardConfig::default());

    for cookie in [
        "next-auth.session-token=tok",
        "__Secure-next-auth.session-token=tok",
        "theme=dark; sessionId=abc",
    ] {
        let request = Request::builder()
            .uri("/admin")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let res = send(&server, request).await;
        assert_eq!(res.status(), StatusCode::OK, "{cookie}");

        let body: serde_json::Value = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn test_empty_or_unknown_cookie_is_challenged() {
    let (server, _) = server(GuardConfig::default());

    for cookie in ["sessionId=", "session=abc"] {
        let request = Request::builder()
            .uri("/api/admin/content")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let res = send(&server, request).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "{cookie}");
    }
}

#[tokio::test]
async fn test_malformed_cookie_header_is_challenged() {
    let (server, _) = server(GuardConfig::default());

    let request = Request::builder()
        .uri("/admin")
        .header(
            header::COOKIE,
            header::HeaderValue::from_bytes(b"sessionId=\xffabc").unwrap(),
        )
        .body(Body::empty())
        .unwrap();
    let res = send(&server, request).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_static_and_public_paths_pass_through() {
    let (server, _) = server(GuardConfig::default());

    let res = send(&server, get("/health")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ok");

    // No route behind these, but the gate lets them through.
    for uri in ["/_next/static/chunks/app.js", "/favicon.ico", "/images/me.webp", "/blog/hello"] {
        let res = send(&server, get(uri)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_prefix_match_respects_segments() {
    let (server, _) = server(GuardConfig::default());

    let res = send(&server, get("/administrator")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&server, get("/admin/settings")).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (server, _) = server(GuardConfig::default());

    let res = send(&server, get("/health")).await;
    let headers = res.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(
        headers[header::REFERRER_POLICY],
        "strict-origin-when-cross-origin"
    );
    assert_eq!(
        headers[header::STRICT_TRANSPORT_SECURITY],
        "max-age=63072000; includeSubDomains; preload"
    );
    assert!(headers[header::CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .contains("frame-ancestors 'none'"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let (server, _) = server(GuardConfig::default());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let res = send(&server, request).await;
    assert_eq!(res.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_headers_can_be_disabled() {
    let mut config = GuardConfig::default();
    config.headers.enabled = false;
    let (server, _) = server(config);

    let res = send(&server, get("/health")).await;
    assert!(!res.headers().contains_key(header::X_FRAME_OPTIONS));
    assert!(!res.headers().contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn test_custom_protected_prefix() {
    let mut config = GuardConfig::default();
    config.gate.protected_prefixes = vec!["/dashboard".to_string()];
    let (server, _) = server(config);

    let res = send(&server, get("/dashboard/stats")).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);

    // `/admin` is public under this policy.
    let res = send(&server, get("/admin")).await;
    assert_eq!(res.status(), StatusCode::OK);
}
