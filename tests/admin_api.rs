//! User and role administration endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{admin_token, get, login, send, test_app, token_for_role};
use serde_json::{Value, json};

async fn me_id(app: &axum::Router, token: &str) -> i64 {
    let (_, me) = get(app, "/api/auth/me", Some(token)).await;
    me["id"].as_i64().unwrap()
}

fn role_id(roles: &Value, name: &str) -> i64 {
    roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == name)
        .and_then(|r| r["id"].as_i64())
        .unwrap()
}

#[tokio::test]
async fn user_crud() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(&admin),
        json!({ "email": "ana@clinic.com", "password": "pw12345", "name": "Ana" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["user"]["id"].as_i64().unwrap();
    assert_eq!(created["user"]["role_name"], "user");
    assert!(created["user"].get("password_hash").is_none());

    let (status, list) = get(&app, "/api/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["email"], "ana@clinic.com");

    let (status, detail) = get(&app, &format!("/api/users/{}", id), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Ana");
    assert!(detail["permissions"].is_array());

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}", id),
        Some(&admin),
        json!({ "name": "Ana Souza" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["user"]["name"], "Ana Souza");
    assert_eq!(updated["user"]["email"], "ana@clinic.com");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}", id),
        Some(&admin),
        json!({ "email": "admin@dashboard.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", id), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, &format!("/api/users/{}", id), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", id), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cannot_delete_self() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;
    let id = me_id(&app, &admin).await;

    let (status, body) = send(&app, Method::DELETE, &format!("/api/users/{}", id), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn own_password_change_needs_current_password() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;
    let user = token_for_role(&app, &admin, "user").await;
    let id = me_id(&app, &user).await;
    let uri = format!("/api/users/{}/password", id);

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&user), json!({ "newPassword": "next456" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&user),
        json!({ "currentPassword": "wrong", "newPassword": "next456" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&user),
        json!({ "currentPassword": "secret123", "newPassword": "next456" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "user@clinic.com", "next456").await;
}

#[tokio::test]
async fn password_change_for_others_needs_manage_users() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;
    let admin_id = me_id(&app, &admin).await;
    let user = token_for_role(&app, &admin, "user").await;
    let user_id = me_id(&app, &user).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/users/{}/password", admin_id),
        Some(&user),
        json!({ "newPassword": "hijack" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["required"], "manage_users");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/users/{}/password", user_id),
        Some(&admin),
        json!({ "newPassword": "reset789" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "user@clinic.com", "reset789").await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/users/999/password",
        Some(&admin),
        json!({ "newPassword": "whatever" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_crud_and_permissions() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;

    let (_, permissions) = get(&app, "/api/admin/permissions", Some(&admin)).await;
    let permissions = permissions.as_array().unwrap().clone();
    assert_eq!(permissions.len(), 9);
    let id_of = |name: &str| {
        permissions
            .iter()
            .find(|p| p["name"] == name)
            .and_then(|p| p["id"].as_i64())
            .unwrap()
    };

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/admin/roles",
        Some(&admin),
        json!({
            "name": "auditor",
            "description": "Read-only analytics",
            "permissions": [id_of("view_dashboard")],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["role"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::POST, "/api/admin/roles", Some(&admin), json!({ "name": "auditor" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/admin/roles/{}", id);
    let (_, detail) = get(&app, &uri, Some(&admin)).await;
    assert_eq!(detail["name"], "auditor");
    assert_eq!(detail["permissions"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("{}/permissions", uri),
        Some(&admin),
        json!({ "permissions": [id_of("view_dashboard"), id_of("view_analytics")] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, detail) = get(&app, &uri, Some(&admin)).await;
    assert_eq!(detail["permissions"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::PATCH, &format!("{}/permissions", uri), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("{}/permissions", uri),
        Some(&admin),
        json!({ "permissions": [9999] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&admin), json!({ "description": "Auditors" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, detail) = get(&app, &uri, Some(&admin)).await;
    assert_eq!(detail["description"], "Auditors");
    assert_eq!(detail["permissions"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, &uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_in_use_cannot_be_deleted() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;
    let (_, roles) = get(&app, "/api/admin/roles", Some(&admin)).await;
    let admin_role = role_id(&roles, "admin");

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/roles/{}", admin_role),
        Some(&admin),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::DELETE, "/api/admin/roles/999", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn permission_changes_apply_to_existing_sessions() {
    let (app, _) = test_app();
    let admin = admin_token(&app).await;
    let user = token_for_role(&app, &admin, "user").await;

    let (status, _) = get(&app, "/api/dashboard/projection", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, roles) = get(&app, "/api/admin/roles", Some(&admin)).await;
    let user_role = role_id(&roles, "user");
    let (_, permissions) = get(&app, "/api/admin/permissions", Some(&admin)).await;
    let ids: Vec<i64> = permissions
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["name"] == "view_dashboard" || p["name"] == "view_analytics")
        .map(|p| p["id"].as_i64().unwrap())
        .collect();

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/admin/roles/{}/permissions", user_role),
        Some(&admin),
        json!({ "permissions": ids }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, "/api/dashboard/projection", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
}
