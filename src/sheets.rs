//! Spreadsheet sources.
//!
//! Every source answers the same question: given an A1 range such as
//! `"Pacientes!A1:Z100"`, return the grid of cell strings, header row first.

use crate::config::{SheetSourceKind, SheetsConfig};
use crate::error::SheetError;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const GOOGLE_SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Raw cell grid as read from a sheet tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    pub rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        SheetGrid { rows }
    }

    /// Build a grid from string literals (handy for fixtures)
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        SheetGrid {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Where the dashboard reads its spreadsheet tabs from
#[derive(Debug, Clone)]
pub enum SheetSource {
    /// Google Sheets v4 values API with an API key
    GoogleSheets {
        client: reqwest::Client,
        spreadsheet_id: String,
        api_key: String,
    },
    /// One `{tab}.csv` file per tab inside `dir`
    Csv { dir: PathBuf },
    /// Grids keyed by tab name
    InMemory(HashMap<String, SheetGrid>),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Tab name of an A1 range: the part before `!`, with sheet quotes removed.
///
/// A range without `!` names the whole tab.
pub fn tab_name(range: &str) -> &str {
    let tab = range.split_once('!').map(|(tab, _)| tab).unwrap_or(range);
    tab.trim_matches('\'')
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetSource {
    /// Build the source selected in the configuration
    pub fn from_config(config: &SheetsConfig) -> Result<Self, SheetError> {
        match config.source {
            SheetSourceKind::Google => {
                if config.spreadsheet_id.is_empty() {
                    return Err(SheetError::Config("spreadsheet_id is not set".to_string()));
                }
                if config.api_key.is_empty() {
                    return Err(SheetError::Config("api_key is not set".to_string()));
                }
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.timeout_seconds))
                    .build()?;
                Ok(SheetSource::GoogleSheets {
                    client,
                    spreadsheet_id: config.spreadsheet_id.clone(),
                    api_key: config.api_key.clone(),
                })
            }
            SheetSourceKind::Csv => Ok(SheetSource::Csv {
                dir: config.csv_dir.clone(),
            }),
        }
    }

    /// In-memory source built from `(tab, grid)` pairs
    pub fn in_memory<I, S>(tabs: I) -> Self
    where
        I: IntoIterator<Item = (S, SheetGrid)>,
        S: Into<String>,
    {
        SheetSource::InMemory(tabs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short label for startup logging
    pub fn describe(&self) -> String {
        match self {
            SheetSource::GoogleSheets { spreadsheet_id, .. } => {
                format!("google sheet {}", spreadsheet_id)
            }
            SheetSource::Csv { dir } => format!("csv directory {}", dir.display()),
            SheetSource::InMemory(tabs) => format!("in-memory ({} tabs)", tabs.len()),
        }
    }

    /// Fetch one range as a grid of strings
    pub async fn fetch(&self, range: &str) -> Result<SheetGrid, SheetError> {
        let grid = match self {
            SheetSource::GoogleSheets {
                client,
                spreadsheet_id,
                api_key,
            } => fetch_google(client, spreadsheet_id, api_key, range).await?,
            SheetSource::Csv { dir } => {
                let path = dir.join(format!("{}.csv", tab_name(range)));
                tokio::task::spawn_blocking(move || read_csv(&path))
                    .await
                    .map_err(|e| SheetError::Io(std::io::Error::other(e)))??
            }
            SheetSource::InMemory(tabs) => tabs
                .get(tab_name(range))
                .cloned()
                .ok_or_else(|| SheetError::UnknownTab(tab_name(range).to_string()))?,
        };
        debug!("Fetched {} rows from {}", grid.rows.len(), range);
        Ok(grid)
    }
}

async fn fetch_google(
    client: &reqwest::Client,
    spreadsheet_id: &str,
    api_key: &str,
    range: &str,
) -> Result<SheetGrid, SheetError> {
    let mut url = reqwest::Url::parse(GOOGLE_SHEETS_API)
        .map_err(|e| SheetError::Config(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| SheetError::Config("invalid API base URL".to_string()))?
        .extend([spreadsheet_id, "values", range]);
    url.query_pairs_mut().append_pair("key", api_key);

    let body: ValueRange = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(SheetGrid::new(
        body.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect(),
    ))
}

fn read_csv(path: &std::path::Path) -> Result<SheetGrid, SheetError> {
    if !path.exists() {
        let tab = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(SheetError::UnknownTab(tab));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(SheetGrid::new(rows))
}
