use crate::month::Month;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

lazy_static! {
    static ref DECIMAL_PREFIX: Regex = Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)").unwrap();
    static ref INTEGER_PREFIX: Regex = Regex::new(r"^[+-]?\d+").unwrap();
}

/// Minimum number of cells a purchase row must carry
pub const PURCHASE_COLUMNS: usize = 9;

/// One purchase line from the purchases sheet
///
/// Columns, in sheet order: reference, year, month code, product, category,
/// formatted month, total value, total units, average unit price.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub reference_id: String,
    pub year: String,
    /// Month code as written in the sheet (`jan`, `fev`, ...)
    pub month: String,
    pub product: String,
    pub category: String,
    pub formatted_month: String,
    pub total_value: f64,
    pub total_units: i64,
    pub average_price: f64,
}

impl PurchaseRecord {
    /// Build a record from one data row
    ///
    /// Returns `None` for rows shorter than [`PURCHASE_COLUMNS`]. Numeric
    /// cells that fail to parse become zero.
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < PURCHASE_COLUMNS {
            return None;
        }

        Some(PurchaseRecord {
            reference_id: row[0].trim().to_string(),
            year: row[1].trim().to_string(),
            month: row[2].trim().to_string(),
            product: row[3].trim().to_string(),
            category: row[4].trim().to_string(),
            formatted_month: row[5].trim().to_string(),
            total_value: parse_brl(&row[6]),
            total_units: parse_int(&row[7]),
            average_price: parse_brl(&row[8]),
        })
    }

    /// Calendar month of the purchase, if the code is recognised
    pub fn month(&self) -> Option<Month> {
        Month::from_code(&self.month)
    }
}

/// Patients attended by one sector, per month
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub sector: String,
    pub counts: [u32; 12],
}

impl PatientRecord {
    /// Build a record from one data row; rows without a sector name are skipped
    pub fn from_row(row: &[String]) -> Option<Self> {
        let sector = row.first().map(|s| s.trim()).unwrap_or_default();
        if sector.is_empty() {
            return None;
        }

        let mut counts = [0u32; 12];
        for (i, count) in counts.iter_mut().enumerate() {
            *count = row
                .get(i + 1)
                .map(|cell| u32::try_from(parse_int(cell)).unwrap_or(0))
                .unwrap_or(0);
        }

        Some(PatientRecord {
            sector: sector.to_string(),
            counts,
        })
    }

    pub fn count(&self, month: Month) -> u32 {
        self.counts[month.index()]
    }

    /// Patient-months across the whole year
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }
}

// {"sector": "...", "janeiro": n, ..., "dezembro": n}
impl Serialize for PatientRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(13))?;
        map.serialize_entry("sector", &self.sector)?;
        for month in Month::ALL {
            map.serialize_entry(month.key(), &self.count(month))?;
        }
        map.end()
    }
}

/// Parse the purchases sheet; the first row is the header
pub fn parse_purchase_rows(rows: &[Vec<String>]) -> Vec<PurchaseRecord> {
    let data = rows.get(1..).unwrap_or_default();
    let records: Vec<PurchaseRecord> = data
        .iter()
        .filter_map(|row| PurchaseRecord::from_row(row))
        .collect();

    let rejected = data.len() - records.len();
    if rejected > 0 {
        debug!("Skipped {} purchase rows with fewer than {} cells", rejected, PURCHASE_COLUMNS);
    }

    records
}

/// Parse the patients sheet; the first row is the header
pub fn parse_patient_rows(rows: &[Vec<String>]) -> Vec<PatientRecord> {
    rows.get(1..)
        .unwrap_or_default()
        .iter()
        .filter_map(|row| PatientRecord::from_row(row))
        .collect()
}

/// Convert a Brazilian currency string (`"R$ 1.234,56"`) to a number
///
/// The leading numeric part is used, so trailing garbage is ignored.
/// Empty or unparseable input yields `0.0`.
pub fn parse_brl(value: &str) -> f64 {
    let cleaned: String = value
        .replace("R$", "")
        .replace('.', "")
        .replace(',', ".")
        .split_whitespace()
        .collect();

    DECIMAL_PREFIX
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse the leading integer of a cell (`"12 un"` is 12), falling back to 0
pub fn parse_int(value: &str) -> i64 {
    INTEGER_PREFIX
        .find(value.trim())
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Round to cents
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to one decimal place, used for percentages
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn brl_values() {
        assert_eq!(parse_brl("R$ 1.234,56"), 1234.56);
        assert_eq!(parse_brl("R$1,5"), 1.5);
        assert_eq!(parse_brl("  R$ 10,00  "), 10.0);
        assert_eq!(parse_brl("- R$ 10,00"), -10.0);
        assert_eq!(parse_brl("R$ 1.000.000,00"), 1_000_000.0);
        assert_eq!(parse_brl("42"), 42.0);
    }

    #[test]
    fn brl_garbage_is_zero() {
        assert_eq!(parse_brl(""), 0.0);
        assert_eq!(parse_brl("R$"), 0.0);
        assert_eq!(parse_brl("n/a"), 0.0);
        assert_eq!(parse_brl("12,5 reais"), 12.5);
    }

    #[test]
    fn integer_prefix() {
        assert_eq!(parse_int("12"), 12);
        assert_eq!(parse_int(" 7 un"), 7);
        assert_eq!(parse_int("3,5"), 3);
        assert_eq!(parse_int("-4"), -4);
        assert_eq!(parse_int("abc"), 0);
        assert_eq!(parse_int(""), 0);
    }

    #[test]
    fn purchase_row_parsing() {
        let rows = vec![
            row(&["Ref", "Ano", "Mes", "Produto", "Categoria", "MesFmt", "Valor", "Qtd", "Preco"]),
            row(&["R1", "2025", "jan", "Luva", "EPI", "jan/25", "R$ 1.200,50", "10", "R$ 120,05"]),
            row(&["R2", "2025", "fev", "Seringa"]),
            row(&["R3", "2025", "FEV", "Gaze", "Curativo", "fev/25", "R$ 30,00", "x", ""]),
        ];

        let records = parse_purchase_rows(&rows);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].reference_id, "R1");
        assert_eq!(records[0].total_value, 1200.5);
        assert_eq!(records[0].total_units, 10);
        assert_eq!(records[0].average_price, 120.05);
        assert_eq!(records[0].month(), Some(Month::Jan));

        assert_eq!(records[1].month(), Some(Month::Feb));
        assert_eq!(records[1].total_units, 0);
        assert_eq!(records[1].average_price, 0.0);
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let rows = vec![row(&["Ref", "Ano"])];
        assert!(parse_purchase_rows(&rows).is_empty());
        assert!(parse_purchase_rows(&[]).is_empty());
        assert!(parse_patient_rows(&[]).is_empty());
    }

    #[test]
    fn patient_row_parsing() {
        let rows = vec![
            row(&["Setor", "Janeiro", "Fevereiro"]),
            row(&["UTI", "10", "20", "", "abc", "-3"]),
            row(&["", "1", "2"]),
            row(&[]),
            row(&[" Pediatria ", "5"]),
        ];

        let patients = parse_patient_rows(&rows);
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].sector, "UTI");
        assert_eq!(patients[0].count(Month::Jan), 10);
        assert_eq!(patients[0].count(Month::Feb), 20);
        assert_eq!(patients[0].count(Month::Mar), 0);
        assert_eq!(patients[0].count(Month::May), 0);
        assert_eq!(patients[0].total(), 30);
        assert_eq!(patients[1].sector, "Pediatria");
    }

    #[test]
    fn patient_serializes_with_month_keys() {
        let mut counts = [0; 12];
        counts[2] = 7;
        let record = PatientRecord {
            sector: "UTI".to_string(),
            counts,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sector"], "UTI");
        assert_eq!(json["marco"], 7);
        assert_eq!(json["dezembro"], 0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(2.345678), 2.35);
        assert_eq!(round2(1200.0), 1200.0);
        assert_eq!(round1(12.36), 12.4);
        assert_eq!(round1(12.34), 12.3);
    }
}
