//! API integration tests.
//!
//! These tests drive the demo router end-to-end against a real SQLite
//! database using axum's test utilities.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlsession::api::{create_router_with_state, AppState};
use sqlsession::codec::KeyPair;
use sqlsession::store::{SqlStore, StoreOptions};
use tempfile::TempDir;
use tower::ServiceExt;

const SESSION: &str = "session";

async fn test_app() -> (Router, SqlStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("api.db").display());
    let options = StoreOptions::new(
        "sessions",
        "/",
        3600,
        vec![KeyPair::signing(b"api-test-key".to_vec())],
    );
    let store = SqlStore::open(&url, options).await.unwrap();
    let app = create_router_with_state(AppState::new(store.clone(), SESSION));
    (app, store, dir)
}

/// Helper to build a request, optionally carrying a cookie.
fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// The `name=value` part of the response's Set-Cookie header.
fn cookie_pair(response: &axum::response::Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

/// Helper to extract body as string.
async fn response_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Helper to extract JSON from response.
async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

#[tokio::test]
async fn test_api_info_reports_session_count() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["name"], "sqlsession");
    assert_eq!(json["sessions"], 0);

    app.clone()
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();

    let response = app
        .oneshot(request(Method::GET, "/api/v1", None))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["sessions"], 1);
}

#[tokio::test]
async fn test_not_found() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .oneshot(request(Method::GET, "/api/v1/nonexistent", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_visits_are_counted_per_session() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response);
    assert!(cookie.starts_with("session="));

    let json = response_json(response).await;
    assert_eq!(json["visits"], 1);
    assert_eq!(json["new_session"], true);
    let session_id = json["session_id"].as_str().unwrap().to_string();

    for expected in 2..=3 {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/visits", Some(&cookie)))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["visits"], expected);
        assert_eq!(json["new_session"], false);
        assert_eq!(json["session_id"], session_id.as_str());
    }

    // A request without the cookie starts its own session.
    let response = app
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();
    let json = response_json(response).await;
    assert_eq!(json["visits"], 1);
    assert_ne!(json["session_id"], session_id.as_str());
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh_session() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();
    let cookie = cookie_pair(&response);

    let mut tampered = cookie.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = app
        .oneshot(request(Method::GET, "/api/v1/visits", Some(&tampered)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["visits"], 1);
    assert_eq!(json["new_session"], true);
}

#[tokio::test]
async fn test_cookie_from_other_key_is_ignored() {
    let (app, _store, _dir) = test_app().await;
    let (other_app, _other_store, _other_dir) = {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("other.db").display());
        let options = StoreOptions::new(
            "sessions",
            "/",
            3600,
            vec![KeyPair::signing(b"a-different-key".to_vec())],
        );
        let store = SqlStore::open(&url, options).await.unwrap();
        let app = create_router_with_state(AppState::new(store.clone(), SESSION));
        (app, store, dir)
    };

    let response = other_app
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();
    let foreign = cookie_pair(&response);

    let response = app
        .oneshot(request(Method::GET, "/api/v1/visits", Some(&foreign)))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["new_session"], true);
}

#[tokio::test]
async fn test_logout_deletes_session() {
    let (app, store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();
    let cookie = cookie_pair(&response);
    assert_eq!(store.session_count().await.unwrap(), 1);

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, "/api/v1/visits", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    assert_eq!(store.session_count().await.unwrap(), 0);

    // The old cookie no longer resolves to a session.
    let response = app
        .oneshot(request(Method::GET, "/api/v1/visits", Some(&cookie)))
        .await
        .unwrap();
    let json = response_json(response).await;
    assert_eq!(json["new_session"], true);
    assert_eq!(json["visits"], 1);
}

#[tokio::test]
async fn test_logout_without_session() {
    let (app, store, _dir) = test_app().await;

    let response = app
        .oneshot(request(Method::DELETE, "/api/v1/visits", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(store.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_closed_store_returns_internal_error() {
    let (app, store, _dir) = test_app().await;
    store.close().await;

    let response = app
        .oneshot(request(Method::GET, "/api/v1/visits", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = response_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
}
