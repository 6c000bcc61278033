/*!
# Spend Dashboard

Backend for a role-based analytics dashboard over hospital purchase and
patient spreadsheets, built in Rust.

## Overview

Purchases and patient volumes live in a spreadsheet (one tab per year of
purchases and one tab of patients per sector). The server reads those tabs on
every request, aggregates them and serves JSON to a browser front end for
charting. Access is controlled by users, roles and permissions.

## Architecture

`SheetSource -> record parsing -> analysis -> response`

### Analysis Layer (always built)
- **month**: The fixed twelve-month calendar and its labels
- **records**: Typed purchase and patient rows, BRL currency parsing
- **analysis**: Monthly and category aggregates, projection, seasonality,
  product search and history
- **patients**: Patient volume per month
- **correlation**: Pearson correlation between patient volume and spend,
  elasticity per category, estimated spend per sector
- **report**: The assembled dashboard payload

### Server Layer (`web` feature)
- **config**: TOML file plus environment overrides
- **sheets**: Google Sheets, CSV directory and in-memory sources
- **store**: Users, roles and permissions persisted as a gzip+bincode snapshot
- **auth**: Argon2 password hashing, bearer sessions, permission checks
- **downloader**: CSV and XLSX export
- **handlers**, **app**: Routes and middleware

## Permissions

| permission | grants |
|---|---|
| `view_dashboard` | dashboard, monthly, category, patients, search |
| `view_analytics` | seasonality, projection, correlation, product analysis |
| `export_data` | CSV / XLSX export |
| `view_users`, `create_users`, `edit_users`, `delete_users`, `manage_users` | user administration |
| `manage_roles` | role and permission administration |

A fresh store is seeded with the `admin`, `manager` and `user` roles and the
account `admin@dashboard.com` / `admin123`.
*/

pub mod analysis;
pub mod correlation;
pub mod month;
pub mod patients;
pub mod records;
pub mod report;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod auth;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod downloader;
#[cfg(feature = "web")]
pub mod error;
#[cfg(feature = "web")]
pub mod handlers;
#[cfg(feature = "web")]
pub mod saving;
#[cfg(feature = "web")]
pub mod sheets;
#[cfg(feature = "web")]
pub mod store;

pub use month::Month;
pub use records::{PatientRecord, PurchaseRecord};
pub use report::DashboardReport;

#[cfg(feature = "web")]
pub use app::{AppState, router};
#[cfg(feature = "web")]
pub use config::Config;
#[cfg(feature = "web")]
pub use error::AppError;
