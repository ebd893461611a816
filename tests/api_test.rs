//! HTTP surface tests against the router, no socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::*;
use risk_scoring::api::{self, AppState};
use risk_scoring::cache::MemoryCache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const KEY: &str = "test-key";

fn app(limit: u32) -> Router {
    let svc = service(engine(benign_adapters()), limit, Duration::from_secs(300))
        .with_cache(Arc::new(MemoryCache::default()));
    api::router(AppState::new(Arc::new(svc), vec![KEY.to_string()]))
}

fn analyze(key: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/analyze")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(k) = key {
        builder = builder.header("X-API-Key", k);
    }
    builder.body(body.into()).unwrap()
}

fn benign_body() -> String {
    serde_json::to_string(&benign_request()).unwrap()
}

async fn json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn analyze_returns_scores_and_meta() {
    let resp = app(100).oneshot(analyze(Some(KEY), benign_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert!(body["meta"]["requestId"].as_str().unwrap().starts_with("req_"));
    assert_eq!(body["meta"]["userId"], "alice@example.com");
    assert_eq!(body["meta"]["modelsVersion"], "test-1");
    for field in ["ip", "datetime", "userAgent", "geolocation", "overall"] {
        let v = body["scores"][field].as_u64().unwrap();
        assert!(v <= 100, "{} = {}", field, v);
    }
}

#[tokio::test]
async fn missing_and_unknown_keys() {
    let app = app(100);
    let resp = app.clone().oneshot(analyze(None, benign_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json(resp).await;
    assert_eq!(body["statusCode"], 401);
    assert!(body["timestamp"].is_string());

    let resp = app.oneshot(analyze(Some("nope"), benign_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let resp = app(100).oneshot(analyze(Some(KEY), "not json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("malformed request body"));
    assert!(body.get("details").is_none());

    let resp = app(100).oneshot(analyze(Some(KEY), "{\"userId\": ")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mistyped_field_is_named() {
    let mut body: Value = serde_json::from_str(&benign_body()).unwrap();
    body["currentSession"]["timestamp"] = Value::from("yesterday");
    let resp = app(100).oneshot(analyze(Some(KEY), body.to_string())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json(resp).await;
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["field"], "currentSession.timestamp");
    assert!(details[0]["message"].as_str().unwrap().contains("invalid type"));
}

#[tokio::test]
async fn invalid_fields_are_listed() {
    let mut request = benign_request();
    request.current_session.ip = "300.0.0.1".into();
    request.current_session.screen_resolution = Some("wide".into());
    let resp = app(100)
        .oneshot(analyze(Some(KEY), serde_json::to_string(&request).unwrap()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json(resp).await;
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["currentSession.ip", "currentSession.screenResolution"]);
}

#[tokio::test]
async fn rate_limit_sets_retry_after() {
    let app = app(2);
    for _ in 0..2 {
        let resp = app.clone().oneshot(analyze(Some(KEY), benign_body())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = app.oneshot(analyze(Some(KEY), benign_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = resp.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry));
    assert_eq!(json(resp).await["statusCode"], 429);
}

#[tokio::test]
async fn health_reports_collaborators() {
    let resp = app(100)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["modelsLoaded"], 4);
    assert_eq!(body["modelsVersion"], "test-1");
    assert_eq!(body["cacheConnected"], true);
    assert_eq!(body["persistenceConnected"], false);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let resp = app(100)
        .oneshot(Request::builder().uri("/api/v2/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(resp).await["statusCode"], 404);
}
