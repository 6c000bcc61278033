use crate::auth::{self, SessionStore};
use crate::config::Config;
use crate::handlers::{self, dashboard, roles, users};
use crate::sheets::SheetSource;
use crate::store::Store;
use anyhow::Context;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, patch, post},
};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Shared state behind every handler
pub struct AppState {
    pub config: Config,
    pub sheets: SheetSource,
    pub store: Store,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, sheets: SheetSource, store: Store) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(
            config.auth.session_ttl_hours.saturating_mul(3600),
        ));
        AppState {
            config,
            sheets,
            store,
            sessions,
        }
    }
}

/// Build the full router: public routes, token-protected routes and the
/// shared middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/register", post(handlers::auth::register));

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/users/:id/password", patch(users::change_password))
        .route("/api/admin/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/api/admin/roles/:id",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route(
            "/api/admin/roles/:id/permissions",
            patch(roles::set_role_permissions),
        )
        .route("/api/admin/permissions", get(roles::list_permissions))
        .route("/api/dashboard/data", get(dashboard::dashboard_data))
        .route("/api/dashboard/monthly", get(dashboard::monthly))
        .route("/api/dashboard/category", get(dashboard::category))
        .route("/api/dashboard/top-products", get(dashboard::top_products))
        .route("/api/dashboard/seasonality", get(dashboard::seasonality))
        .route("/api/dashboard/projection", get(dashboard::projection))
        .route("/api/dashboard/patients", get(dashboard::patients))
        .route(
            "/api/dashboard/product-analysis",
            get(dashboard::product_analysis),
        )
        .route("/api/dashboard/filtered", get(dashboard::filtered))
        .route(
            "/api/dashboard/search-products",
            get(dashboard::search_products),
        )
        .route("/api/dashboard/categories", get(dashboard::categories))
        .route("/api/dashboard/correlation", get(dashboard::correlation))
        .route("/api/dashboard/chart", get(dashboard::chart))
        .route("/api/dashboard/statistics", get(dashboard::statistics))
        .route("/api/dashboard/timeseries", get(dashboard::timeseries))
        .route("/api/dashboard/aggregated", get(dashboard::aggregated))
        .route("/api/dashboard/export", get(dashboard::export))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(&state.config.server.cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("Ignoring invalid CORS origin {:?}", origin);
            cors
        }
    }
}

/// Log `METHOD path -> status (elapsed)` for every request
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        error!("{} {} -> {} ({:?})", method, path, status, start.elapsed());
    } else {
        info!("{} {} -> {} ({:?})", method, path, status, start.elapsed());
    }
    response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Start the server with `config` and serve until Ctrl-C.
///
/// # Arguments
/// * `config` - Fully resolved configuration
///
/// # Returns
/// * `anyhow::Result<()>` - Error if the store, sheet source or listener
///   cannot be set up
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store_path = Some(config.store.path.as_str())
        .filter(|p| !p.is_empty())
        .map(Path::new);
    let store = Store::open(store_path).context("Failed to open user store")?;
    let sheets =
        SheetSource::from_config(&config.sheets).context("Failed to set up sheet source")?;

    info!("Reading spreadsheets from {}", sheets.describe());
    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(config, sheets, store));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Dashboard API listening on http://{}", bind);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.store.flush().context("Failed to flush store")?;
    Ok(())
}
