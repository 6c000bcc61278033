//! The server wired from a TOML config: CSV sheet tabs and a snapshot store on disk.

mod common;

use axum::http::{Method, StatusCode};
use common::{admin_token, get, send};
use serde_json::json;
use spend_dashboard::app::{AppState, router};
use spend_dashboard::config::{Config, SheetSourceKind};
use spend_dashboard::sheets::SheetSource;
use spend_dashboard::store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const PURCHASES_CSV: &str = "\
ID,Ano,Mes,Produto,Categoria,Mes/Ano,Valor Total,Qtd,Preco Medio
1,2025,jan,Luva Nitrilica,EPI,Jan/2025,\"R$ 1.000,00\",100,\"R$ 10,00\"
2,2025,fev,Luva Nitrilica,EPI,Fev/2025,\"R$ 1.500,00\",150,\"R$ 10,00\"
3,2025,fev,Gaze Esteril,Curativo,Fev/2025,\"R$ 250,50\",125,\"R$ 2,00\"
";

const PATIENTS_CSV: &str = "\
Setor,Jan,Fev
UTI,100,120
Pediatria,50,60
";

fn config_for(dir: &Path) -> Config {
    let toml = format!(
        r#"
[sheets]
source = "csv"
csv_dir = "{}"

[store]
path = "{}"
"#,
        dir.join("tabs").display(),
        dir.join("db").join("store.bin.gz").display(),
    );
    Config::from_toml(&toml).unwrap()
}

fn build(config: Config) -> axum::Router {
    let sheets = SheetSource::from_config(&config.sheets).unwrap();
    let store = Store::open(Some(Path::new(&config.store.path))).unwrap();
    router(Arc::new(AppState::new(config, sheets, store)))
}

#[tokio::test]
async fn csv_tabs_feed_the_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tabs")).unwrap();
    fs::write(dir.path().join("tabs").join("2025.csv"), PURCHASES_CSV).unwrap();
    fs::write(dir.path().join("tabs").join("Pacientes.csv"), PATIENTS_CSV).unwrap();

    let config = config_for(dir.path());
    assert_eq!(config.sheets.source, SheetSourceKind::Csv);
    let app = build(config);
    let token = admin_token(&app).await;

    let (status, body) = get(&app, "/api/dashboard/data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["totalSpent"], 2750.5);
    assert_eq!(body["stats"]["totalPurchases"], 3);
    assert_eq!(body["byMonth"][1]["total"], 1750.5);
    assert_eq!(body["patients"]["stats"]["totalPatients"], 330);

    let (status, body) = get(&app, "/api/dashboard/monthly?range=2024!A1:Z100", Some(&token)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch spreadsheet data");
}

#[tokio::test]
async fn accounts_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tabs")).unwrap();

    let app = build(config_for(dir.path()));
    let admin = admin_token(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(&admin),
        json!({ "email": "ana@clinic.com", "password": "pw12345", "name": "Ana" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(dir.path().join("db").join("store.bin.gz").exists());

    let restarted = build(config_for(dir.path()));
    common::login(&restarted, "ana@clinic.com", "pw12345").await;

    // sessions are not persisted
    let (status, _) = get(&restarted, "/api/auth/me", Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
