use crate::app::AppState;
use crate::auth::{AuthUser, verify_password};
use crate::error::AppError;
use crate::handlers::{blocking, message};
use crate::store::{NewUser, UserDetail, UserSummary, UserUpdate, perm};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    auth.require(perm::VIEW_USERS)?;
    Ok(Json(state.store.list_users()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetail>, AppError> {
    auth.require(perm::VIEW_USERS)?;
    Ok(Json(state.store.user_detail(id)?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(new): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(perm::CREATE_USERS)?;
    let user = blocking(&state, move |s| s.store.create_user(new)).await?;
    info!("{} created user {}", auth.email, user.email);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<Value>, AppError> {
    auth.require(perm::EDIT_USERS)?;
    let user = blocking(&state, move |s| s.store.update_user(id, update)).await?;
    if !user.is_active {
        state.sessions.revoke_user(id);
    }
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    auth.require(perm::DELETE_USERS)?;
    if auth.id == id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }
    blocking(&state, move |s| s.store.delete_user(id)).await?;
    state.sessions.revoke_user(id);
    info!("{} deleted user {}", auth.email, id);
    Ok(message("User deleted successfully"))
}

/// Change a password.
///
/// Users may change their own password by giving the current one; holders of
/// `manage_users` may set anyone's password without it.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<PasswordChange>,
) -> Result<Json<Value>, AppError> {
    let new_password = req
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("New password is required"))?;

    let is_admin = auth.has(perm::MANAGE_USERS);
    let is_self = auth.id == id;
    if !is_self && !is_admin {
        return Err(AppError::missing_permission(perm::MANAGE_USERS));
    }

    let current = req.current_password.filter(|p| !p.is_empty());
    if is_self && !is_admin && current.is_none() {
        return Err(AppError::bad_request("Current password is required"));
    }

    let user = state
        .store
        .user_by_id(id)
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if let (true, Some(current)) = (is_self, current) {
        let hash = user.password_hash;
        let valid = blocking(&state, move |_| verify_password(&current, &hash)).await?;
        if !valid {
            return Err(AppError::unauthorized("Current password is incorrect"));
        }
    }

    blocking(&state, move |s| s.store.set_password(id, &new_password)).await?;
    info!("Password changed for user {} by {}", id, auth.email);
    Ok(message("Password updated successfully"))
}
