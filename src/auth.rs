//! Password hashing, bearer sessions and the authentication middleware.

use crate::app::AppState;
use crate::error::{AppError, StoreError};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Hash a password using Argon2
///
/// Creates a salted Argon2id hash in PHC string format.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, StoreError>` - The password hash or `StoreError::Hash`
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| StoreError::Hash)
}

/// Verify a password against a stored hash
///
/// # Arguments
/// * `password` - The plaintext password to verify
/// * `hash` - The stored PHC hash string
///
/// # Returns
/// * `Result<bool, StoreError>` - Whether the password matches, or an error
///   if the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, StoreError> {
    let parsed = PasswordHash::new(hash).map_err(|_| StoreError::Hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    expires_at: SystemTime,
}

/// Opaque bearer tokens issued at login
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new token for `user_id`
    pub fn create(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id,
            expires_at: SystemTime::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(token.clone(), session);
        token
    }

    /// User id behind a live token
    pub fn validate(&self, token: &str) -> Option<i64> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(token)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.user_id)
    }

    /// Drop a token; returns whether it existed
    pub fn revoke(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token).is_some()
    }

    /// Drop every token of a user (after deletion or deactivation)
    pub fn revoke_user(&self, user_id: i64) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.user_id != user_id);
    }
}

/// The caller of an authenticated request, with the permissions of its role
/// as of this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role_id: i64,
    pub permissions: Vec<String>,
    pub token: String,
}

impl AuthUser {
    pub fn has(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// `Ok` when the caller holds `permission`, a 403 naming it otherwise
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            debug!("{} lacks permission {}", self.email, permission);
            Err(AppError::missing_permission(permission))
        }
    }
}

/// Middleware that resolves the bearer token into an [`AuthUser`] extension.
///
/// A missing token is a 401; an unknown or expired token, or one whose user
/// has since been removed or deactivated, is a 403.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(AppError::unauthorized("Token not provided"));
    };
    let token = bearer.token();

    let user = state
        .sessions
        .validate(token)
        .and_then(|id| state.store.user_by_id(id))
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::forbidden("Invalid or expired token"))?;

    let auth_user = AuthUser {
        id: user.id,
        email: user.email,
        role_id: user.role_id,
        permissions: state.store.permission_names_for_role(user.role_id),
        token: token.to_string(),
    };
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}
