//! Shared fixtures for the HTTP integration tests.
//!
//! `test_app()` builds the full router over an in-memory store and an
//! in-memory sheet source holding a small purchases tab and patients tab.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use spend_dashboard::app::{AppState, router};
use spend_dashboard::config::Config;
use spend_dashboard::sheets::{SheetGrid, SheetSource};
use spend_dashboard::store::{DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD, Store};
use std::sync::Arc;
use tower::ServiceExt;

pub const PURCHASES_TAB: &str = "2025";
pub const PATIENTS_TAB: &str = "Pacientes";

/// Monthly spend: Jan 1500, Fev 1500, Mar 2600. One short row is rejected.
pub fn purchases_grid() -> SheetGrid {
    SheetGrid::from_rows([
        vec!["ID", "Ano", "Mes", "Produto", "Categoria", "Mes/Ano", "Valor Total", "Qtd", "Preco Medio"],
        vec!["1", "2025", "jan", "Luva Nitrilica", "EPI", "Jan/2025", "R$ 1.000,00", "100", "R$ 10,00"],
        vec!["2", "2025", "jan", "Gaze Esteril", "Curativo", "Jan/2025", "R$ 500,00", "250", "R$ 2,00"],
        vec!["3", "2025", "fev", "Luva Nitrilica", "EPI", "Fev/2025", "R$ 1.500,00", "150", "R$ 10,00"],
        vec!["4", "2025", "mar", "Dipirona", "Medicamento", "Mar/2025", "R$ 2.000,00", "400", "R$ 5,00"],
        vec!["5", "2025", "mar", "Gaze Esteril", "Curativo", "Mar/2025", "R$ 600,00", "300", "R$ 2,00"],
        vec!["6", "2025"],
    ])
}

/// Patients per month: Jan 150, Fev 180, Mar 220.
pub fn patients_grid() -> SheetGrid {
    SheetGrid::from_rows([
        vec!["Setor", "Jan", "Fev", "Mar", "Abr"],
        vec!["UTI", "100", "120", "150", "0"],
        vec!["Pediatria", "50", "60", "70", ""],
    ])
}

pub fn sample_source() -> SheetSource {
    SheetSource::in_memory([
        (PURCHASES_TAB, purchases_grid()),
        (PATIENTS_TAB, patients_grid()),
    ])
}

pub fn app_with_source(sheets: SheetSource) -> (Router, Arc<AppState>) {
    let store = Store::in_memory().unwrap();
    let state = Arc::new(AppState::new(Config::default(), sheets, store));
    (router(state.clone()), state)
}

pub fn test_app() -> (Router, Arc<AppState>) {
    app_with_source(sample_source())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();

    TestResponse {
        status,
        headers,
        bytes,
    }
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let resp = request(app, Method::GET, uri, token, None).await;
    (resp.status, resp.json())
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let resp = request(app, method, uri, token, Some(body)).await;
    (resp.status, resp.json())
}

/// Log in and return the bearer token
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

pub async fn admin_token(app: &Router) -> String {
    login(app, DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD).await
}

/// Create a user with the named role through the API and log in as them
pub async fn token_for_role(app: &Router, admin: &str, role: &str) -> String {
    let (_, roles) = get(app, "/api/admin/roles", Some(admin)).await;
    let role_id = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == role)
        .map(|r| r["id"].as_i64().unwrap())
        .unwrap();

    let email = format!("{}@clinic.com", role);
    let (status, _) = send(
        app,
        Method::POST,
        "/api/users",
        Some(admin),
        serde_json::json!({
            "email": email,
            "password": "secret123",
            "name": role,
            "role_id": role_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    login(app, &email, "secret123").await
}
