//! Analytics endpoints.
//!
//! Every request reads the sheet source afresh and recomputes; nothing is
//! cached between requests.

use crate::analysis::{
    self, AggregatedPoint, CategoryAggregate, ChartPoint, DEFAULT_LIST_LIMIT,
    DEFAULT_PROJECTION_MONTHS, GeneralStats, MonthlyAggregate, ProductHistory, ProductMatch,
    Projection, Seasonality, TimePoint, TopProduct,
};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::correlation::{self, CorrelationSummary};
use crate::downloader::{self, ExportFormat};
use crate::error::AppError;
use crate::patients::{self, PatientMonth, PatientStats};
use crate::records::{self, PatientRecord, PurchaseRecord};
use crate::report::DashboardReport;
use crate::store::perm;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Largest `months` accepted by the projection endpoint
pub const MAX_PROJECTION_MONTHS: usize = 24;

/// Largest `limit` accepted by listing endpoints
pub const MAX_LIST_LIMIT: usize = 1000;

/// Query parameters shared by the dashboard endpoints. Each endpoint reads
/// the ones it needs.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// A1 range overriding the configured purchases range
    pub range: Option<String>,
    pub months: Option<String>,
    pub limit: Option<String>,
    pub product: Option<String>,
    /// Comma separated category names
    pub categories: Option<String>,
    pub query: Option<String>,
    pub format: Option<String>,
}

impl DashboardQuery {
    fn category_list(&self) -> Vec<String> {
        self.categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Parse an optional positive count bounded by `max`
fn parse_count(value: Option<&str>, default: usize, max: usize, name: &str) -> Result<usize, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or_else(|| {
                AppError::bad_request(format!("{} must be an integer between 1 and {}", name, max))
            }),
    }
}

async fn load_purchases(state: &AppState, range: Option<&str>) -> Result<Vec<PurchaseRecord>, AppError> {
    let range = range
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(&state.config.sheets.purchases_range);
    let grid = state.sheets.fetch(range).await?;
    let purchases = records::parse_purchase_rows(&grid.rows);
    debug!("Parsed {} purchases from {}", purchases.len(), range);
    Ok(purchases)
}

async fn load_patients(state: &AppState) -> Result<Vec<PatientRecord>, AppError> {
    let grid = state
        .sheets
        .fetch(&state.config.sheets.patients_range)
        .await?;
    Ok(records::parse_patient_rows(&grid.rows))
}

async fn load_both(
    state: &AppState,
    range: Option<&str>,
) -> Result<(Vec<PurchaseRecord>, Vec<PatientRecord>), AppError> {
    tokio::try_join!(load_purchases(state, range), load_patients(state))
}

pub async fn dashboard_data(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<DashboardReport>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let (purchases, patients) = load_both(&state, q.range.as_deref()).await?;
    Ok(Json(DashboardReport::build(&purchases, &patients)))
}

pub async fn monthly(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<MonthlyAggregate>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::analyze_by_month(&purchases)))
}

pub async fn category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<CategoryAggregate>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::analyze_by_category(&purchases)))
}

pub async fn top_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<TopProduct>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let limit = parse_count(q.limit.as_deref(), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, "limit")?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::top_expensive_products(&purchases, limit)))
}

pub async fn seasonality(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Option<Seasonality>>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::analyze_seasonality(&purchases)))
}

pub async fn projection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Projection>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let months = parse_count(
        q.months.as_deref(),
        DEFAULT_PROJECTION_MONTHS,
        MAX_PROJECTION_MONTHS,
        "months",
    )?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::project_future_expenses(&purchases, months)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientsResponse {
    pub stats: PatientStats,
    pub by_month: Vec<PatientMonth>,
    pub sectors: Vec<PatientRecord>,
}

pub async fn patients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PatientsResponse>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let sectors = load_patients(&state).await?;
    Ok(Json(PatientsResponse {
        stats: patients::patient_stats(&sectors),
        by_month: patients::analyze_patients_by_month(&sectors),
        sectors,
    }))
}

pub async fn product_analysis(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<ProductHistory>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let product = q
        .product
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("Product name is required"))?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    analysis::analyze_product_history(&purchases, product)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product not found"))
}

pub async fn filtered(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<DashboardReport>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let (purchases, patients) = load_both(&state, q.range.as_deref()).await?;
    Ok(Json(DashboardReport::build_filtered(
        &purchases,
        &patients,
        &q.category_list(),
    )))
}

pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<ProductMatch>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let query = q
        .query
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("Query is required"))?;
    let limit = parse_count(q.limit.as_deref(), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, "limit")?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::search_products(&purchases, query, limit)))
}

pub async fn categories(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::categories(&purchases)))
}

pub async fn correlation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<CorrelationSummary>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let (purchases, patients) = load_both(&state, q.range.as_deref()).await?;
    Ok(Json(correlation::correlation_summary(&purchases, &patients)))
}

pub async fn chart(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<ChartPoint>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::category_chart(&purchases)))
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<GeneralStats>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::general_stats(&purchases)))
}

pub async fn timeseries(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<TimePoint>>, AppError> {
    auth.require(perm::VIEW_DASHBOARD)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::time_series(&purchases)))
}

pub async fn aggregated(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Vec<AggregatedPoint>>, AppError> {
    auth.require(perm::VIEW_ANALYTICS)?;
    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    Ok(Json(analysis::aggregated(&purchases)))
}

/// Download purchase records (optionally category-filtered) as CSV or XLSX
pub async fn export(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<DashboardQuery>,
) -> Result<Response, AppError> {
    auth.require(perm::EXPORT_DATA)?;
    let format = ExportFormat::parse(q.format.as_deref())
        .ok_or_else(|| AppError::bad_request("format must be csv or xlsx"))?;

    let purchases = load_purchases(&state, q.range.as_deref()).await?;
    let selected = analysis::filter_by_categories(&purchases, &q.category_list());
    let body = downloader::export(&selected, format)
        .map_err(|e| AppError::internal(format!("Export failed: {}", e)))?;

    let disposition = format!("attachment; filename=\"purchases.{}\"", format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
