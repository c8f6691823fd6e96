//! HTTP API tests
//!
//! The full router is driven with `oneshot`; pages come from an offline
//! source so nothing leaves the process.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use webapp_catalog::catalog::{AccessPolicy, AppAnalyzer, Catalog, MemoryStore};
use webapp_catalog::error::FetchError;
use webapp_catalog::fetch::{PageSource, RawPage};
use webapp_catalog::handlers::apps::{CLAIMS_HEADER, EMAIL_HEADER, NAME_HEADER};
use webapp_catalog::handlers::router;

const MEMBER: &str = "me@example.com";

struct OfflinePages;

#[async_trait]
impl PageSource for OfflinePages {
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        if url.host_str() == Some("down.example") {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        Ok(RawPage {
            url: url.clone(),
            status: 200,
            content_type: "text/html".to_string(),
            body: r#"<title>Ledger</title><meta name="description" content="Track payments and invoices.">"#
                .to_string(),
            truncated: false,
            duration_ms: 1,
        })
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let catalog = Catalog::new(
        Arc::new(AppAnalyzer::new(Arc::new(OfflinePages))),
        store.clone(),
        AccessPolicy::new([MEMBER], Some("catalogAccess".to_string())),
    );
    Harness {
        app: router(Arc::new(catalog)),
        store,
    }
}

fn json_request(method: Method, uri: &str, body: Value, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(email) = email {
        builder = builder.header(EMAIL_HEADER, email);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: Method, uri: &str, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(email) = email {
        builder = builder.header(EMAIL_HEADER, email);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_describe_app_returns_record() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        json_request(
            Method::POST,
            "/api/describe-app",
            json!({ "url": "https://ledger.example" }),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ledger");
    assert_eq!(body["category"], "Finance");
    assert_eq!(body["description"], "Track payments and invoices.");
    assert!(body["iconUrl"].as_str().unwrap().contains("ledger.example"));
    assert!(body["createdAt"].is_i64());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_describe_app_degrades_for_unreachable_host() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        json_request(
            Method::POST,
            "/api/describe-app",
            json!({ "url": "https://down.example" }),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "down.example");
    assert_eq!(body["tagline"], "Web application");
    assert!(body["iconUrl"].as_str().unwrap().starts_with("https://api.dicebear.com/"));
}

#[tokio::test]
async fn test_describe_app_rejects_bad_input() {
    let h = harness();
    for payload in [json!({ "url": "not a url" }), json!({ "url": "" }), json!({})] {
        let (status, body) = send_json(
            &h.app,
            json_request(Method::POST, "/api/describe-app", payload.clone(), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_listing_requires_access() {
    let h = harness();

    let (status, body) = send_json(&h.app, empty_request(Method::GET, "/api/apps", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("sign-in required"));

    let (status, _) = send_json(
        &h.app,
        empty_request(Method::GET, "/api/apps", Some("stranger@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send_json(&h.app, empty_request(Method::GET, "/api/apps", Some(MEMBER))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_claim_grants_access() {
    let h = harness();
    let request = Request::builder()
        .uri("/api/apps")
        .header(CLAIMS_HEADER, "catalogAccess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_list_delete_flow() {
    let h = harness();

    let (status, created) = send_json(
        &h.app,
        json_request(
            Method::POST,
            "/api/apps",
            json!({ "url": "https://ledger.example" }),
            Some(MEMBER),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["createdBy"], MEMBER);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(h.store.len(), 1);

    let (_, listed) =
        send_json(&h.app, empty_request(Method::GET, "/api/apps", Some(MEMBER))).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let (status, _) = send(
        &h.app,
        empty_request(Method::DELETE, &format!("/api/apps/{id}"), Some(MEMBER)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.store.is_empty());

    let (status, _) = send(
        &h.app,
        empty_request(Method::DELETE, &format!("/api/apps/{id}"), Some(MEMBER)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_attributes_display_name_without_email() {
    let h = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/apps")
        .header(header::CONTENT_TYPE, "application/json")
        .header(CLAIMS_HEADER, "catalogAccess")
        .header(NAME_HEADER, "Robin")
        .body(Body::from(json!({ "url": "https://ledger.example" }).to_string()))
        .unwrap();
    let (status, body) = send_json(&h.app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["createdBy"], "Robin");
}

#[tokio::test]
async fn test_create_reports_unsaved_record() {
    let h = harness();
    h.store.set_available(false);

    let (status, body) = send_json(
        &h.app,
        json_request(
            Method::POST,
            "/api/apps",
            json!({ "url": "https://ledger.example" }),
            Some(MEMBER),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["app"]["name"], "Ledger");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_create_requires_access_before_analysis() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        json_request(
            Method::POST,
            "/api/apps",
            json!({ "url": "https://ledger.example" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_health_and_status() {
    let h = harness();

    let (status, body) = send_json(&h.app, empty_request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    send(
        &h.app,
        json_request(
            Method::POST,
            "/api/describe-app",
            json!({ "url": "https://ledger.example" }),
            None,
        ),
    )
    .await;

    let (status, body) = send_json(&h.app, empty_request(Method::GET, "/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "webapp-catalog");
    assert_eq!(body["analyses_processed"], 1);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let h = harness();
    send(
        &h.app,
        json_request(
            Method::POST,
            "/api/describe-app",
            json!({ "url": "https://ledger.example" }),
            None,
        ),
    )
    .await;

    let (status, body) = send(&h.app, empty_request(Method::GET, "/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("catalog_requests_total"));
    assert!(text.contains("catalog_analyses_total"));
}

#[tokio::test]
async fn test_cors_preflight_from_localhost() {
    let h = harness();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/apps")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );
}
