use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::{blocking, message};
use crate::store::{NewRole, Permission, Role, RoleDetail, RoleUpdate, perm};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PermissionAssignment {
    pub permissions: Option<Vec<i64>>,
}

pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Role>>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    Ok(Json(state.store.list_roles()))
}

pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<RoleDetail>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    Ok(Json(state.store.role_detail(id)?))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(new): Json<NewRole>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    let role = blocking(&state, move |s| s.store.create_role(new)).await?;
    info!("{} created role {}", auth.email, role.name);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Role created successfully", "role": role })),
    ))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<Value>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    blocking(&state, move |s| s.store.update_role(id, update)).await?;
    Ok(message("Role updated successfully"))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    blocking(&state, move |s| s.store.delete_role(id)).await?;
    info!("{} deleted role {}", auth.email, id);
    Ok(message("Role deleted successfully"))
}

/// Replace the permission set of a role
pub async fn set_role_permissions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<PermissionAssignment>,
) -> Result<Json<Value>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    let permissions = req
        .permissions
        .ok_or_else(|| AppError::bad_request("permissions must be an array"))?;
    blocking(&state, move |s| s.store.set_role_permissions(id, &permissions)).await?;
    Ok(message("Permissions updated successfully"))
}

pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Permission>>, AppError> {
    auth.require(perm::MANAGE_ROLES)?;
    Ok(Json(state.store.list_permissions()))
}
