//! Purchase aggregation, projection and seasonality.
//!
//! Every function here is pure: it takes the parsed records of one request and
//! returns owned summaries. Currency values are summed at full precision and
//! rounded only when written into the output structs.

use crate::month::Month;
use crate::records::{PurchaseRecord, round1, round2};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Number of months projected when the caller does not ask for a count
pub const DEFAULT_PROJECTION_MONTHS: usize = 3;

/// Default cap for top product and product search listings
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Minimum query length for product search
pub const MIN_SEARCH_QUERY: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    pub month: String,
    pub total: f64,
    pub count: usize,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub category: String,
    pub total: f64,
    pub count: usize,
    pub units: i64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralStats {
    pub total_spent: f64,
    pub total_purchases: usize,
    pub total_units: i64,
    pub total_categories: usize,
    pub average_ticket: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product: String,
    pub category: String,
    pub total_value: f64,
    pub units: i64,
    pub average_price: f64,
    pub month: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMonth {
    pub month: String,
    pub projected_value: f64,
    pub trend_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub mean_monthly: f64,
    pub trend_pct: f64,
    pub projections: Vec<ProjectedMonth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthValue {
    pub month: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seasonality {
    pub mean: f64,
    pub highest: MonthValue,
    pub lowest: MonthValue,
    /// Spread between the highest and lowest month as a percentage of the mean
    pub variation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMatch {
    pub product: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHistory {
    pub product: String,
    pub category: String,
    pub total_purchases: usize,
    pub total_spent: f64,
    pub total_units: i64,
    pub average_price: f64,
    pub monthly_history: Vec<MonthlyAggregate>,
    pub projection: Projection,
}

/// Spend per calendar month, always twelve entries in calendar order
pub fn analyze_by_month(records: &[PurchaseRecord]) -> Vec<MonthlyAggregate> {
    let mut totals = [0.0f64; 12];
    let mut counts = [0usize; 12];

    for record in records {
        if let Some(month) = record.month() {
            totals[month.index()] += record.total_value;
            counts[month.index()] += 1;
        }
    }

    Month::ALL
        .iter()
        .map(|month| {
            let total = totals[month.index()];
            let count = counts[month.index()];
            MonthlyAggregate {
                month: month.label().to_string(),
                total: round2(total),
                count,
                average: if count > 0 {
                    round2(total / count as f64)
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Spend per category, largest total first
pub fn analyze_by_category(records: &[PurchaseRecord]) -> Vec<CategoryAggregate> {
    // (total, count, units), keyed by category, in first-seen order
    let mut order: Vec<&str> = Vec::new();
    let mut buckets: HashMap<&str, (f64, usize, i64)> = HashMap::new();

    for record in records {
        let bucket = buckets.entry(record.category.as_str()).or_insert_with(|| {
            order.push(record.category.as_str());
            (0.0, 0, 0)
        });
        bucket.0 += record.total_value;
        bucket.1 += 1;
        bucket.2 = bucket.2.saturating_add(record.total_units);
    }

    let mut categories: Vec<CategoryAggregate> = order
        .into_iter()
        .map(|category| {
            let (total, count, units) = buckets[category];
            CategoryAggregate {
                category: category.to_string(),
                total: round2(total),
                count,
                units,
                average: round2(total / count as f64),
            }
        })
        .collect();

    categories.sort_by(|a, b| b.total.total_cmp(&a.total));
    categories
}

// Unit counts come straight from the sheet, so a single bad cell can be huge
fn sum_units(records: &[PurchaseRecord]) -> i64 {
    records
        .iter()
        .fold(0i64, |acc, r| acc.saturating_add(r.total_units))
}

pub fn general_stats(records: &[PurchaseRecord]) -> GeneralStats {
    let total_spent: f64 = records.iter().map(|r| r.total_value).sum();
    let total_units = sum_units(records);
    let categories: HashSet<&str> = records.iter().map(|r| r.category.as_str()).collect();

    GeneralStats {
        total_spent: round2(total_spent),
        total_purchases: records.len(),
        total_units,
        total_categories: categories.len(),
        average_ticket: if records.is_empty() {
            0.0
        } else {
            round2(total_spent / records.len() as f64)
        },
    }
}

/// The `limit` most expensive purchase lines
pub fn top_expensive_products(records: &[PurchaseRecord], limit: usize) -> Vec<TopProduct> {
    let mut sorted: Vec<&PurchaseRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));

    sorted
        .into_iter()
        .take(limit)
        .map(|r| TopProduct {
            product: r.product.clone(),
            category: r.category.clone(),
            total_value: round2(r.total_value),
            units: r.total_units,
            average_price: round2(r.average_price),
            month: r.formatted_month.clone(),
        })
        .collect()
}

/// Months that carry spend, with their calendar month
fn populated_months(monthly: &[MonthlyAggregate]) -> Vec<(Month, f64)> {
    monthly
        .iter()
        .enumerate()
        .filter(|(_, m)| m.total > 0.0)
        .map(|(i, m)| (Month::from_index(i), m.total))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Percentage change between the mean of the first and second half
///
/// The first half takes the extra element when the count is odd. Fewer than
/// two values, or a zero first half, give no trend.
pub fn trend_percentage(totals: &[f64]) -> f64 {
    if totals.len() < 2 {
        return 0.0;
    }

    let split = totals.len().div_ceil(2);
    let first = mean(&totals[..split]);
    let second = mean(&totals[split..]);

    if first == 0.0 {
        return 0.0;
    }

    (second - first) / first * 100.0
}

/// Linear projection of monthly spend from a precomputed monthly series
///
/// `monthly` must be the twelve entries produced by [`analyze_by_month`].
/// Projected months follow the calendar month of the last populated entry,
/// so spend in Jan and Mar projects into Abr, Mai, ...
pub fn project_from_monthly(monthly: &[MonthlyAggregate], months_ahead: usize) -> Projection {
    let populated = populated_months(monthly);
    let totals: Vec<f64> = populated.iter().map(|(_, total)| *total).collect();

    let mean_monthly = mean(&totals);
    let trend = trend_percentage(&totals);

    let last_index = populated
        .last()
        .map(|(month, _)| month.index())
        .unwrap_or(11);

    let projections = (1..=months_ahead)
        .map(|step| ProjectedMonth {
            month: Month::from_index(last_index + step).label().to_string(),
            projected_value: round2(mean_monthly * (1.0 + trend / 100.0 * step as f64)),
            trend_pct: round1(trend),
        })
        .collect();

    Projection {
        mean_monthly: round2(mean_monthly),
        trend_pct: round1(trend),
        projections,
    }
}

/// Project future spend for the next `months_ahead` months
pub fn project_future_expenses(records: &[PurchaseRecord], months_ahead: usize) -> Projection {
    project_from_monthly(&analyze_by_month(records), months_ahead)
}

/// Highest and lowest spending months; `None` when no month has spend
pub fn analyze_seasonality(records: &[PurchaseRecord]) -> Option<Seasonality> {
    let monthly = analyze_by_month(records);
    let populated = populated_months(&monthly);

    let (first_month, first_total) = *populated.first()?;
    let mut highest = (first_month, first_total);
    let mut lowest = (first_month, first_total);

    for &(month, total) in &populated[1..] {
        if total > highest.1 {
            highest = (month, total);
        }
        if total < lowest.1 {
            lowest = (month, total);
        }
    }

    let totals: Vec<f64> = populated.iter().map(|(_, total)| *total).collect();
    let mean = mean(&totals);

    Some(Seasonality {
        mean: round2(mean),
        highest: MonthValue {
            month: highest.0.label().to_string(),
            value: round2(highest.1),
        },
        lowest: MonthValue {
            month: lowest.0.label().to_string(),
            value: round2(lowest.1),
        },
        variation: round1((highest.1 - lowest.1) / mean * 100.0),
    })
}

fn matches_product(record: &PurchaseRecord, needle_lower: &str) -> bool {
    record.product.to_lowercase().contains(needle_lower)
}

/// Purchase history of every product whose name contains `product_name`
///
/// Matching is case-insensitive. Returns `None` when nothing matches.
pub fn analyze_product_history(records: &[PurchaseRecord], product_name: &str) -> Option<ProductHistory> {
    let needle = product_name.to_lowercase();
    let matching: Vec<PurchaseRecord> = records
        .iter()
        .filter(|r| matches_product(r, &needle))
        .cloned()
        .collect();

    let first = matching.first()?;

    let total_spent: f64 = matching.iter().map(|r| r.total_value).sum();
    let total_units = sum_units(&matching);
    let monthly_history = analyze_by_month(&matching);
    let projection = project_from_monthly(&monthly_history, DEFAULT_PROJECTION_MONTHS);

    Some(ProductHistory {
        product: first.product.clone(),
        category: first.category.clone(),
        total_purchases: matching.len(),
        total_spent: round2(total_spent),
        total_units,
        average_price: if total_units > 0 {
            round2(total_spent / total_units as f64)
        } else {
            0.0
        },
        monthly_history,
        projection,
    })
}

/// Records whose category is one of `categories`; an empty list keeps everything
pub fn filter_by_categories(records: &[PurchaseRecord], categories: &[String]) -> Vec<PurchaseRecord> {
    if categories.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|r| categories.iter().any(|c| *c == r.category))
        .cloned()
        .collect()
}

/// Autocomplete lookup over product names
///
/// Queries shorter than [`MIN_SEARCH_QUERY`] characters return nothing.
/// Each product name appears once, in the order first seen.
pub fn search_products(records: &[PurchaseRecord], query: &str, limit: usize) -> Vec<ProductMatch> {
    if query.chars().count() < MIN_SEARCH_QUERY {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();

    records
        .iter()
        .filter(|r| matches_product(r, &needle))
        .filter(|r| seen.insert(r.product.as_str()))
        .take(limit)
        .map(|r| ProductMatch {
            product: r.product.clone(),
            category: r.category.clone(),
        })
        .collect()
}

/// Distinct categories in ascending order
pub fn categories(records: &[PurchaseRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    pub name: String,
    pub value: f64,
    pub count: usize,
}

/// Category totals shaped for the legacy chart view
pub fn category_chart(records: &[PurchaseRecord]) -> Vec<ChartPoint> {
    analyze_by_category(records)
        .into_iter()
        .map(|c| ChartPoint {
            name: c.category,
            value: c.total,
        })
        .collect()
}

/// Monthly totals shaped for the legacy time series view
pub fn time_series(records: &[PurchaseRecord]) -> Vec<TimePoint> {
    analyze_by_month(records)
        .into_iter()
        .map(|m| TimePoint {
            date: m.month,
            value: m.total,
        })
        .collect()
}

pub fn aggregated(records: &[PurchaseRecord]) -> Vec<AggregatedPoint> {
    analyze_by_category(records)
        .into_iter()
        .map(|c| AggregatedPoint {
            name: c.category,
            value: c.total,
            count: c.count,
        })
        .collect()
}
