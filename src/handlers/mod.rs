//! HTTP handlers, one module per route group.

pub mod auth;
pub mod dashboard;
pub mod roles;
pub mod users;

use crate::app::AppState;
use crate::error::{AppError, StoreError};
use axum::Json;
use serde_json::{Value, json};
use std::sync::Arc;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

/// `{"message": ...}` body used by mutations that return nothing else
pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Run a store call off the async runtime; these hash passwords or write
/// the snapshot file
pub(crate) async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, AppError>
where
    F: FnOnce(&AppState) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| AppError::internal(format!("Worker failed: {}", e)))?
        .map_err(AppError::from)
}
