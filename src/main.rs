use anyhow::Context;
use clap::Parser;
use spend_dashboard::{Config, app};
use std::path::PathBuf;

/// Role-based purchase and patient analytics API
#[derive(Debug, Parser)]
#[command(name = "spend-dashboard", version, about)]
struct Args {
    /// Path to a TOML config file (defaults to ./dashboard.toml if present)
    #[arg(short, long, env = "DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding the config file and environment
    #[arg(short, long)]
    bind: Option<String>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.init_config {
        print!("{}", Config::default_toml());
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    app::run(config).await
}
