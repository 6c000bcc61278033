use crate::analysis::{
    self, CategoryAggregate, DEFAULT_LIST_LIMIT, DEFAULT_PROJECTION_MONTHS, GeneralStats,
    MonthlyAggregate, Projection, Seasonality, TopProduct,
};
use crate::patients::{self, PatientMonth, PatientStats};
use crate::records::{PatientRecord, PurchaseRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientsOverview {
    pub stats: PatientStats,
    pub by_month: Vec<PatientMonth>,
}

impl PatientsOverview {
    pub fn build(patients: &[PatientRecord]) -> Self {
        PatientsOverview {
            stats: patients::patient_stats(patients),
            by_month: patients::analyze_patients_by_month(patients),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub total_records: usize,
    pub last_update: DateTime<Utc>,
}

/// The main dashboard payload: every purchase analysis plus patient volume
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub stats: GeneralStats,
    pub by_month: Vec<MonthlyAggregate>,
    pub by_category: Vec<CategoryAggregate>,
    pub top_products: Vec<TopProduct>,
    pub seasonality: Option<Seasonality>,
    pub projection: Projection,
    pub patients: PatientsOverview,
    /// Present only on category-filtered reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_filtered: Option<usize>,
    pub metadata: ReportMetadata,
}

impl DashboardReport {
    pub fn build(purchases: &[PurchaseRecord], patients: &[PatientRecord]) -> Self {
        let by_month = analysis::analyze_by_month(purchases);
        let projection = analysis::project_from_monthly(&by_month, DEFAULT_PROJECTION_MONTHS);

        DashboardReport {
            stats: analysis::general_stats(purchases),
            by_category: analysis::analyze_by_category(purchases),
            top_products: analysis::top_expensive_products(purchases, DEFAULT_LIST_LIMIT),
            seasonality: analysis::analyze_seasonality(purchases),
            by_month,
            projection,
            patients: PatientsOverview::build(patients),
            total_filtered: None,
            metadata: ReportMetadata {
                total_records: purchases.len(),
                last_update: Utc::now(),
            },
        }
    }

    /// Same report over the purchases of the given categories only
    pub fn build_filtered(
        purchases: &[PurchaseRecord],
        patients: &[PatientRecord],
        categories: &[String],
    ) -> Self {
        let filtered = analysis::filter_by_categories(purchases, categories);
        let mut report = Self::build(&filtered, patients);
        report.total_filtered = Some(filtered.len());
        report
    }
}
