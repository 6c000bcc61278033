use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::error;
use serde_json::json;

/// Failure while reading the spreadsheet source
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown sheet tab: {0}")]
    UnknownTab(String),

    #[error("Sheet source misconfigured: {0}")]
    Config(String),
}

/// Failure in the users / roles / permissions store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Password hashing failed")]
    Hash,

    #[error("Failed to persist store: {0}")]
    Persist(#[from] std::io::Error),
}

/// Unified error type that renders as a JSON `{"error": "..."}` response
/// with an appropriate HTTP status code.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Permission the caller was missing, for 403 responses
    pub required: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            required: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn missing_permission(permission: &str) -> Self {
        Self {
            required: Some(permission.to_string()),
            ..Self::forbidden("Missing permission to access this resource")
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.required {
            Some(required) => json!({ "error": self.message, "required": required }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SheetError> for AppError {
    fn from(e: SheetError) -> Self {
        error!("Spreadsheet fetch failed: {}", e);
        AppError::internal("Failed to fetch spreadsheet data")
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AppError::not_found(msg),
            StoreError::Conflict(msg) | StoreError::Invalid(msg) => AppError::bad_request(msg),
            other => {
                error!("Store failure: {}", other);
                AppError::internal("Internal server error")
            }
        }
    }
}
