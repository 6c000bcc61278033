//! Server configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables, so a deployment can run on environment alone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origin allowed by CORS (the front end).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Which backend serves the spreadsheet grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetSourceKind {
    /// Google Sheets values API, authenticated with an API key.
    #[default]
    Google,
    /// A directory holding one CSV file per tab.
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub source: SheetSourceKind,

    /// Google spreadsheet id.
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Google API key (read-only access).
    #[serde(default)]
    pub api_key: String,

    /// Directory for the CSV source.
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,

    /// A1 range of the purchases tab.
    #[serde(default = "default_purchases_range")]
    pub purchases_range: String,

    /// A1 range of the patients tab.
    #[serde(default = "default_patients_range")]
    pub patients_range: String,

    /// Timeout for one fetch, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            source: SheetSourceKind::default(),
            spreadsheet_id: String::new(),
            api_key: String::new(),
            csv_dir: default_csv_dir(),
            purchases_range: default_purchases_range(),
            patients_range: default_patients_range(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_csv_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_purchases_range() -> String {
    "2025!A1:Z25000".to_string()
}

fn default_patients_range() -> String {
    "Pacientes!A1:Z100".to_string()
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login session.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
        }
    }
}

fn default_session_ttl() -> u64 {
    7 * 24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file for users and roles; empty keeps everything in memory.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "database/store.bin.gz".to_string()
}

impl Config {
    /// Load from `path` if given (or `dashboard.toml` if it exists), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("dashboard.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override settings from environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("BIND_ADDR") {
            self.server.bind = bind;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().context("PORT must be a port number")?;
            let host = self.server.bind.rsplit_once(':').map(|(h, _)| h).unwrap_or("127.0.0.1");
            self.server.bind = format!("{}:{}", host, port);
        }
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.server.cors_origin = origin;
        }
        if let Some(source) = lookup("SHEET_SOURCE") {
            self.sheets.source = match source.to_lowercase().as_str() {
                "google" => SheetSourceKind::Google,
                "csv" => SheetSourceKind::Csv,
                other => anyhow::bail!("Unknown SHEET_SOURCE: {}", other),
            };
        }
        if let Some(id) = lookup("GOOGLE_SHEET_ID") {
            self.sheets.spreadsheet_id = id;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.sheets.api_key = key;
        }
        if let Some(dir) = lookup("SHEET_CSV_DIR") {
            self.sheets.csv_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("DASHBOARD_STORE") {
            self.store.path = path;
        }
        if let Some(ttl) = lookup("SESSION_TTL_HOURS") {
            self.auth.session_ttl_hours = ttl.parse().context("SESSION_TTL_HOURS must be a number")?;
        }
        Ok(())
    }

    /// Default configuration rendered as TOML, for `--init-config`.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
