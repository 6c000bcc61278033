use crate::records::PurchaseRecord;
use std::error::Error;

type ExportResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Column headers shared by every export format
pub const EXPORT_HEADERS: [&str; 9] = [
    "Reference",
    "Year",
    "Month",
    "Product",
    "Category",
    "Period",
    "Total Value",
    "Units",
    "Average Price",
];

/// Export format accepted by the export endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// Parse a `format` query value; absent means CSV
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("csv") => Some(ExportFormat::Csv),
            Some("xlsx") => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Render purchase records in the requested format
pub fn export(records: &[PurchaseRecord], format: ExportFormat) -> ExportResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(records).map(String::into_bytes),
        ExportFormat::Xlsx => to_xlsx(records),
    }
}

/// Convert purchase records to CSV
///
/// Writes a header row followed by one row per record. Quoting of commas,
/// quotes and newlines is handled by the `csv` writer.
///
/// # Arguments
/// * `records` - Purchases to export
///
/// # Returns
/// * `ExportResult<String>` - CSV content as a string or an error
pub fn to_csv(records: &[PurchaseRecord]) -> ExportResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;

    for r in records {
        writer.write_record([
            r.reference_id.clone(),
            r.year.clone(),
            r.month.clone(),
            r.product.clone(),
            r.category.clone(),
            r.formatted_month.clone(),
            format!("{:.2}", r.total_value),
            r.total_units.to_string(),
            format!("{:.2}", r.average_price),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Convert purchase records to XLSX
///
/// Text columns are written as strings and the value, unit and price columns
/// as numbers, so the sheet can be summed directly in Excel.
///
/// # Arguments
/// * `records` - Purchases to export
///
/// # Returns
/// * `ExportResult<Vec<u8>>` - XLSX file content as bytes or an error
pub fn to_xlsx(records: &[PurchaseRecord]) -> ExportResult<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Purchases")?;

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (i, r) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, &r.reference_id)?;
        worksheet.write_string(row, 1, &r.year)?;
        worksheet.write_string(row, 2, &r.month)?;
        worksheet.write_string(row, 3, &r.product)?;
        worksheet.write_string(row, 4, &r.category)?;
        worksheet.write_string(row, 5, &r.formatted_month)?;
        worksheet.write_number(row, 6, r.total_value)?;
        worksheet.write_number(row, 7, r.total_units as f64)?;
        worksheet.write_number(row, 8, r.average_price)?;
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
