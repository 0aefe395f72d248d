use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use resource_api::config::{AppConfig, DEFAULT_CONFIG_PATH};
use resource_api::database::DatabaseManager;
use resource_api::{router, AppState};

#[derive(Parser)]
#[command(name = "resource-api")]
#[command(about = "Bearer-token authorized resource API")]
#[command(version)]
struct Args {
    #[arg(short = 'c', long, help = "Path to config file (.yml)")]
    config: Option<PathBuf>,

    #[arg(short = 'v', long, help = "Print the effective config before serving")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up API_SECRET, API_DB, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // An explicit -c must exist; the default file is optional.
    let config_path = args.config.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    });
    let config = AppConfig::load(config_path.as_deref()).context("config error")?;
    tracing::info!("Starting resource API in {:?} mode", config.environment);

    if args.verbose {
        println!("#---- server config ----");
        print!("{}", serde_yaml::to_string(&config)?);
        println!("#---- /config ----");
    }

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("database error")?;
    let state = AppState::new(&config, pool.clone()).context("store error")?;
    tracing::info!(
        "serving table {} for {} authorized ids",
        config.database.table,
        state.authorizer.registry().len()
    );
    let app = router(state);

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on {} (prefix {})", bind_addr, config.api.prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pool.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
