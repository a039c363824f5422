//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;

use super::types::{ErrorResponse, VisitResponse};
use crate::error::SessionError;
use crate::store::{Registry, SqlStore};

const VISITS_KEY: &str = "visits";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: SqlStore,
    /// Cookie name of the session the handlers work with.
    pub session_name: Arc<str>,
}

impl AppState {
    pub fn new(store: SqlStore, session_name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            session_name: session_name.into(),
        }
    }
}

fn internal_error(e: SessionError) -> ApiError {
    tracing::error!(error = %e, "Session store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal_error(e.to_string())),
    )
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state.store.session_count().await.map_err(internal_error)?;

    Ok(Json(json!({
        "name": "sqlsession",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "sessions": sessions,
    })))
}

/// Count a visit in the caller's session, starting one if needed.
pub async fn visit(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<VisitResponse>), ApiError> {
    let mut registry = Registry::new(&state.store, &headers);

    let session = registry.get(&state.session_name).await;
    let new_session = session.is_new;
    let visits = session
        .values
        .get(VISITS_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
        + 1;
    session.values.insert(VISITS_KEY.to_string(), json!(visits));

    let mut response = HeaderMap::new();
    registry.save(&mut response).await.map_err(internal_error)?;
    let session_id = registry.get(&state.session_name).await.id.clone();

    Ok((
        response,
        Json(VisitResponse {
            session_id,
            visits,
            new_session,
        }),
    ))
}

/// Delete the caller's session and expire its cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    let mut session = state.store.new_session(&headers, &state.session_name).await;

    let mut response = HeaderMap::new();
    state
        .store
        .delete(&mut session, &mut response)
        .await
        .map_err(internal_error)?;

    Ok((StatusCode::NO_CONTENT, response))
}
