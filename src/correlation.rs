//! Spend versus patient volume.
//!
//! Purchases and patient counts come from two unrelated sheets; the only thing
//! they share is the calendar month. Everything here lines the two series up by
//! month and measures how spend follows patient volume.

use crate::month::Month;
use crate::patients::total_for_month;
use crate::records::{PatientRecord, PurchaseRecord, round2};
use serde::Serialize;
use std::collections::HashMap;

/// Correlation above which a category is said to follow patient volume
pub const CORRELATION_THRESHOLD: f64 = 0.3;

/// Attached to every sector level result
pub const SECTOR_ALLOCATION_NOTE: &str = "Spend is not tracked per sector in the source data. \
Sector figures distribute total spend by each sector's share of patient-months and are estimates only.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpend {
    pub category: String,
    pub total: f64,
    pub per_patient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCorrelation {
    pub month: String,
    pub total_patients: u64,
    pub total_spent: f64,
    pub spend_per_patient: f64,
    pub category_spend: Vec<CategorySpend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorCorrelation {
    pub sector: String,
    pub total_patients: u64,
    pub total_spent: f64,
    pub spend_per_patient: f64,
    pub category_spend: Vec<CategorySpend>,
    /// Always true: sector spend is a proportional allocation, not a measurement
    pub estimated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Positive,
    Negative,
    Neutral,
}

impl TrendLabel {
    pub fn classify(correlation: f64) -> Self {
        if correlation > CORRELATION_THRESHOLD {
            TrendLabel::Positive
        } else if correlation < -CORRELATION_THRESHOLD {
            TrendLabel::Negative
        } else {
            TrendLabel::Neutral
        }
    }

    fn describe(self, category: &str, elasticity: f64) -> String {
        match self {
            TrendLabel::Positive => format!(
                "For each 1% increase in patients attended, spending on {} rises by {:.2}%",
                category,
                elasticity.abs()
            ),
            TrendLabel::Negative => format!(
                "Negative correlation: more patients attended does not increase spending on {}",
                category
            ),
            TrendLabel::Neutral => format!(
                "No significant correlation between patients attended and spending on {}",
                category
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticityResult {
    pub category: String,
    pub correlation: f64,
    /// Percent change in spend per percent change in patients
    pub elasticity: f64,
    pub trend: TrendLabel,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSummary {
    pub overall_spend_per_patient: f64,
    pub by_month: Vec<MonthCorrelation>,
    pub by_sector: Vec<SectorCorrelation>,
    pub elasticity: Vec<ElasticityResult>,
    pub sector_allocation_note: String,
}

/// Pearson correlation coefficient of `(x, y)` pairs
///
/// Returns 0 when either series has no variance (including fewer than two
/// pairs). The result is clamped into `[-1, 1]`.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    let sum_x: f64 = pairs.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = pairs.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = pairs.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = pairs.iter().map(|(x, _)| x * x).sum();
    let sum_y2: f64 = pairs.iter().map(|(_, y)| y * y).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let variance_product = (n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y);

    if variance_product <= 0.0 || !variance_product.is_finite() {
        return 0.0;
    }

    (numerator / variance_product.sqrt()).clamp(-1.0, 1.0)
}

fn percent_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Category totals in first-seen order, sorted by total descending
fn category_spend<'a>(
    records: impl Iterator<Item = &'a PurchaseRecord>,
    scale: f64,
    patients: u64,
) -> Vec<CategorySpend> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for record in records {
        let total = totals.entry(record.category.as_str()).or_insert_with(|| {
            order.push(record.category.as_str());
            0.0
        });
        *total += record.total_value * scale;
    }

    let mut spend: Vec<CategorySpend> = order
        .into_iter()
        .map(|category| {
            let total = totals[category];
            CategorySpend {
                category: category.to_string(),
                total: round2(total),
                per_patient: per_patient(total, patients),
            }
        })
        .collect();

    spend.sort_by(|a, b| b.total.total_cmp(&a.total));
    spend
}

fn per_patient(spend: f64, patients: u64) -> f64 {
    if patients > 0 {
        round2(spend / patients as f64)
    } else {
        0.0
    }
}

/// Spend and patient volume side by side for each calendar month
pub fn correlate_by_month(
    purchases: &[PurchaseRecord],
    patients: &[PatientRecord],
) -> Vec<MonthCorrelation> {
    Month::ALL
        .iter()
        .map(|&month| {
            let in_month: Vec<&PurchaseRecord> = purchases
                .iter()
                .filter(|r| r.month() == Some(month))
                .collect();

            let total_patients = total_for_month(patients, month);
            let total_spent: f64 = in_month.iter().map(|r| r.total_value).sum();

            MonthCorrelation {
                month: month.label().to_string(),
                total_patients,
                total_spent: round2(total_spent),
                spend_per_patient: per_patient(total_spent, total_patients),
                category_spend: category_spend(in_month.into_iter(), 1.0, total_patients),
            }
        })
        .collect()
}

/// Spend per sector, allocated by share of patient-months
///
/// The source data has no per-sector spend, so each sector receives
/// `total spend * sector patient-months / all patient-months`. Results are
/// flagged with `estimated: true` and ordered by patient volume.
pub fn correlate_by_sector(
    purchases: &[PurchaseRecord],
    patients: &[PatientRecord],
) -> Vec<SectorCorrelation> {
    let all_patients: u64 = patients.iter().map(PatientRecord::total).sum();
    let all_spend: f64 = purchases.iter().map(|r| r.total_value).sum();

    let mut sectors: Vec<SectorCorrelation> = patients
        .iter()
        .map(|sector| {
            let total_patients = sector.total();
            let share = if all_patients > 0 {
                total_patients as f64 / all_patients as f64
            } else {
                0.0
            };
            let total_spent = all_spend * share;

            SectorCorrelation {
                sector: sector.sector.clone(),
                total_patients,
                total_spent: round2(total_spent),
                spend_per_patient: per_patient(total_spent, total_patients),
                category_spend: category_spend(purchases.iter(), share, total_patients),
                estimated: true,
            }
        })
        .collect();

    sectors.sort_by(|a, b| b.total_patients.cmp(&a.total_patients));
    sectors
}

/// Correlation and elasticity of each category's spend against patient volume
pub fn analyze_elasticity(
    purchases: &[PurchaseRecord],
    patients: &[PatientRecord],
) -> Vec<ElasticityResult> {
    elasticity_from_months(&correlate_by_month(purchases, patients))
}

fn elasticity_from_months(by_month: &[MonthCorrelation]) -> Vec<ElasticityResult> {
    let valid: Vec<&MonthCorrelation> = by_month
        .iter()
        .filter(|m| m.total_patients > 0 && m.total_spent > 0.0)
        .collect();

    if valid.len() < 2 {
        return Vec::new();
    }

    let mut categories: Vec<&str> = Vec::new();
    for month in &valid {
        for spend in &month.category_spend {
            if !categories.contains(&spend.category.as_str()) {
                categories.push(spend.category.as_str());
            }
        }
    }

    let mut results: Vec<ElasticityResult> = categories
        .into_iter()
        .filter_map(|category| {
            // (patients, category spend) for months where the category has spend
            let pairs: Vec<(f64, f64)> = valid
                .iter()
                .filter_map(|month| {
                    let spend = month
                        .category_spend
                        .iter()
                        .find(|c| c.category == category)
                        .map(|c| c.total)
                        .unwrap_or(0.0);
                    (spend > 0.0).then_some((month.total_patients as f64, spend))
                })
                .collect();

            if pairs.len() < 2 {
                return None;
            }

            let correlation = pearson(&pairs);

            let (first, last) = (pairs[0], pairs[pairs.len() - 1]);
            let patient_change = percent_change(first.0, last.0);
            let spend_change = percent_change(first.1, last.1);
            let elasticity = if patient_change != 0.0 {
                spend_change / patient_change
            } else {
                0.0
            };

            let trend = TrendLabel::classify(correlation);

            Some(ElasticityResult {
                category: category.to_string(),
                correlation: round2(correlation),
                elasticity: round2(elasticity),
                trend,
                description: trend.describe(category, elasticity),
            })
        })
        .collect();

    results.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    results
}

/// Everything the correlation view needs in one payload
pub fn correlation_summary(
    purchases: &[PurchaseRecord],
    patients: &[PatientRecord],
) -> CorrelationSummary {
    let by_month = correlate_by_month(purchases, patients);
    let by_sector = correlate_by_sector(purchases, patients);
    let elasticity = elasticity_from_months(&by_month);

    let total_patients: u64 = by_month.iter().map(|m| m.total_patients).sum();
    let total_spent: f64 = by_month.iter().map(|m| m.total_spent).sum();

    CorrelationSummary {
        overall_spend_per_patient: per_patient(total_spent, total_patients),
        by_month,
        by_sector,
        elasticity,
        sector_allocation_note: SECTOR_ALLOCATION_NOTE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(month: &str, category: &str, value: f64) -> PurchaseRecord {
        PurchaseRecord {
            reference_id: String::new(),
            year: "2025".to_string(),
            month: month.to_string(),
            product: format!("{} item", category),
            category: category.to_string(),
            formatted_month: String::new(),
            total_value: value,
            total_units: 1,
            average_price: value,
        }
    }

    fn sector(name: &str, counts: &[u32]) -> PatientRecord {
        let mut all = [0; 12];
        all[..counts.len()].copy_from_slice(counts);
        PatientRecord {
            sector: name.to_string(),
            counts: all,
        }
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(TrendLabel::classify(0.31), TrendLabel::Positive);
        assert_eq!(TrendLabel::classify(0.29), TrendLabel::Neutral);
        assert_eq!(TrendLabel::classify(0.3), TrendLabel::Neutral);
        assert_eq!(TrendLabel::classify(-0.29), TrendLabel::Neutral);
        assert_eq!(TrendLabel::classify(-0.31), TrendLabel::Negative);
    }

    #[test]
    fn pearson_perfect_lines() {
        let rising = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0)];
        assert!((pearson(&rising) - 1.0).abs() < 1e-12);

        let falling = [(1.0, 8.0), (2.0, 6.0), (3.0, 4.0), (4.0, 2.0)];
        assert!((pearson(&falling) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_without_variance_is_zero() {
        assert_eq!(pearson(&[]), 0.0);
        assert_eq!(pearson(&[(1.0, 1.0)]), 0.0);
        assert_eq!(pearson(&[(3.0, 1.0), (3.0, 5.0), (3.0, 9.0)]), 0.0);
    }

    #[test]
    fn pearson_is_symmetric_and_bounded() {
        let samples: Vec<Vec<(f64, f64)>> = vec![
            vec![(120.0, 3400.5), (98.0, 2800.0), (143.0, 4100.25), (110.0, 2500.0)],
            vec![(1.0, 0.3), (2.0, 0.1), (3.0, 0.7), (4.0, 0.2), (5.0, 0.9)],
            vec![(1e6, 1e-3), (2e6, 3e-3), (3e6, 2e-3)],
            vec![(0.1, 0.1), (0.2, 0.2 + 1e-15), (0.3, 0.3)],
        ];

        for pairs in samples {
            let swapped: Vec<(f64, f64)> = pairs.iter().map(|&(x, y)| (y, x)).collect();
            let r = pearson(&pairs);
            assert!((-1.0..=1.0).contains(&r), "r = {} out of range", r);
            assert!((r - pearson(&swapped)).abs() < 1e-9);
        }
    }

    #[test]
    fn months_line_up_with_patients() {
        let purchases = vec![
            purchase("jan", "EPI", 300.0),
            purchase("jan", "Medicamento", 700.0),
            purchase("FEV", "EPI", 50.0),
        ];
        let patients = vec![sector("UTI", &[60, 0]), sector("Pediatria", &[40, 0])];

        let by_month = correlate_by_month(&purchases, &patients);
        assert_eq!(by_month.len(), 12);

        let jan = &by_month[0];
        assert_eq!(jan.month, "Jan");
        assert_eq!(jan.total_patients, 100);
        assert_eq!(jan.total_spent, 1000.0);
        assert_eq!(jan.spend_per_patient, 10.0);
        assert_eq!(jan.category_spend[0].category, "Medicamento");
        assert_eq!(jan.category_spend[0].per_patient, 7.0);

        let feb = &by_month[1];
        assert_eq!(feb.total_spent, 50.0);
        assert_eq!(feb.spend_per_patient, 0.0);
        assert_eq!(feb.category_spend[0].per_patient, 0.0);
    }

    #[test]
    fn elasticity_of_growing_category() {
        let purchases = vec![
            purchase("jan", "EPI", 1000.0),
            purchase("fev", "EPI", 1500.0),
            purchase("jan", "Limpeza", 200.0),
        ];
        let patients = vec![sector("UTI", &[100, 200])];

        let results = analyze_elasticity(&purchases, &patients);
        assert_eq!(results.len(), 1);

        let epi = &results[0];
        assert_eq!(epi.category, "EPI");
        assert_eq!(epi.correlation, 1.0);
        assert_eq!(epi.elasticity, 0.5);
        assert_eq!(epi.trend, TrendLabel::Positive);
        assert!(epi.description.contains("0.50%"));
        assert!(epi.description.contains("EPI"));
    }

    #[test]
    fn elasticity_needs_two_valid_months() {
        let purchases = vec![purchase("jan", "EPI", 1000.0), purchase("fev", "EPI", 1500.0)];
        let patients = vec![sector("UTI", &[100, 0])];
        assert!(analyze_elasticity(&purchases, &patients).is_empty());
        assert!(analyze_elasticity(&[], &[]).is_empty());
    }

    #[test]
    fn elasticity_sorted_by_strength() {
        let purchases = vec![
            purchase("jan", "Sobe", 100.0),
            purchase("fev", "Sobe", 200.0),
            purchase("mar", "Sobe", 300.0),
            purchase("jan", "Oscila", 100.0),
            purchase("fev", "Oscila", 300.0),
            purchase("mar", "Oscila", 100.0),
        ];
        let patients = vec![sector("UTI", &[10, 20, 30])];

        let results = analyze_elasticity(&purchases, &patients);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].category, "Sobe");
        assert_eq!(results[0].trend, TrendLabel::Positive);
        assert_eq!(results[1].category, "Oscila");
        assert_eq!(results[1].correlation, 0.0);
        assert_eq!(results[1].trend, TrendLabel::Neutral);
    }

    #[test]
    fn sectors_split_spend_by_patient_share() {
        let purchases = vec![purchase("jan", "EPI", 300.0), purchase("fev", "Gaze", 100.0)];
        let patients = vec![sector("Pediatria", &[5, 5]), sector("UTI", &[10, 20])];

        let sectors = correlate_by_sector(&purchases, &patients);
        assert_eq!(sectors[0].sector, "UTI");
        assert_eq!(sectors[0].total_patients, 30);
        assert_eq!(sectors[0].total_spent, 300.0);
        assert_eq!(sectors[0].spend_per_patient, 10.0);
        assert_eq!(sectors[0].category_spend[0].total, 225.0);
        assert!(sectors[0].estimated);

        assert_eq!(sectors[1].sector, "Pediatria");
        assert_eq!(sectors[1].total_spent, 100.0);
    }

    #[test]
    fn summary_spend_per_patient() {
        let purchases = vec![purchase("jan", "EPI", 300.0), purchase("fev", "EPI", 100.0)];
        let patients = vec![sector("UTI", &[10, 30])];

        let summary = correlation_summary(&purchases, &patients);
        assert_eq!(summary.overall_spend_per_patient, 10.0);
        assert_eq!(summary.by_month.len(), 12);
        assert_eq!(summary.by_sector.len(), 1);
        assert_eq!(summary.sector_allocation_note, SECTOR_ALLOCATION_NOTE);

        let empty = correlation_summary(&[], &[]);
        assert_eq!(empty.overall_spend_per_patient, 0.0);
        assert!(empty.by_sector.is_empty());
    }
}
