use crate::app::AppState;
use crate::auth::{AuthUser, verify_password};
use crate::error::AppError;
use crate::handlers::{blocking, message};
use crate::store::{NewUser, PermissionInfo};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub permissions: Vec<PermissionInfo>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<PermissionInfo>,
}

/// Exchange email and password for a bearer token.
///
/// Unknown emails, wrong passwords and inactive accounts are all 401.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let user = state
        .store
        .find_user_by_email(&req.email)
        .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

    if !user.is_active {
        warn!("Login attempt for inactive user {}", user.email);
        return Err(AppError::unauthorized("User is inactive"));
    }

    let password = req.password;
    let hash = user.password_hash.clone();
    let valid = blocking(&state, move |_| verify_password(&password, &hash)).await?;
    if !valid {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = state.sessions.create(user.id);
    info!("User {} logged in", user.email);

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            role: state.store.role_name(user.role_id).unwrap_or_default(),
            permissions: state.store.permissions_for_role(user.role_id),
            email: user.email,
            name: user.name,
        },
    }))
}

/// Self-service sign up. New accounts always get the default role.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(mut new): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    new.role_id = None;
    let user = blocking(&state, move |s| s.store.create_user(new)).await?;
    info!("Registered user {}", user.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": {
                "id": user.id,
                "email": user.email,
                "name": user.name,
                "role_id": user.role_id,
            }
        })),
    ))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MeResponse>, AppError> {
    let detail = state.store.user_detail(auth.id)?;
    Ok(Json(MeResponse {
        id: detail.user.id,
        email: detail.user.email,
        name: detail.user.name,
        role: detail.user.role_name,
        is_active: detail.user.is_active,
        created_at: detail.user.created_at,
        permissions: detail.permissions,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    state.sessions.revoke(&auth.token);
    info!("User {} logged out", auth.email);
    message("Logged out")
}
