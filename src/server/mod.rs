//! Remote document server for nutrisync.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /users/{user_id}/document`: The user's document, or 404
//! - `PUT /users/{user_id}/document`: Replace the user's document (204)
//!
//! Document routes require `Authorization: Bearer <key>`. A key may only
//! access its own user's document; other users get 403.

pub mod auth;
pub mod config;
pub mod storage;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use nutrisync_core::RemoteDocument;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use auth::{ApiKeyEntry, ApiKeyStore, AuthUser};
pub use config::ServerConfig;
pub use storage::{ServerStorage, ServerStorageError};

use auth::{auth_middleware, error_response};

/// Application state shared across handlers
#[derive(Clone)]
pub struct ServerState {
    pub api_keys: Arc<ApiKeyStore>,
    pub storage: ServerStorage,
}

impl ServerState {
    pub fn new(api_keys: ApiKeyStore, storage: ServerStorage) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            storage,
        }
    }
}

/// Builds the application router.
pub fn router(state: ServerState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/users/{user_id}/document",
            get(get_document).put(put_document),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Rejects access to another user's document.
fn check_owner(user: &AuthUser, user_id: &str) -> Result<(), Response> {
    if user.user_id == user_id {
        return Ok(());
    }
    tracing::warn!(
        authenticated = %user.user_id,
        requested = %user_id,
        "rejected access to another user's document"
    );
    Err(error_response(
        StatusCode::FORBIDDEN,
        "forbidden",
        "API key does not grant access to this user",
    ))
}

fn storage_error(e: ServerStorageError) -> Response {
    match e {
        ServerStorageError::InvalidUserId(_) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_user", e.to_string())
        }
        _ => {
            tracing::error!("Storage error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to access document storage",
            )
        }
    }
}

async fn get_document(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Response {
    if let Err(response) = check_owner(&user, &user_id) {
        return response;
    }

    match state.storage.load(&user_id) {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "No document stored"),
        Err(e) => storage_error(e),
    }
}

async fn put_document(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(mut document): Json<RemoteDocument>,
) -> Response {
    if let Err(response) = check_owner(&user, &user_id) {
        return response;
    }

    // Server time decides ordering between devices.
    document.updated_at = Utc::now();

    match state.storage.save(&user_id, &document) {
        Ok(()) => {
            tracing::info!(
                user_id = %user_id,
                bytes = document.app_state.len(),
                "document stored"
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => storage_error(e),
    }
}
