//! HMS API server
//!
//! Loads configuration, applies migrations and serves the REST and WebSocket
//! API until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use hms_server::api::{self, ApiState};
use hms_server::{DatabaseManager, HmsConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BLACKLIST_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser)]
#[command(name = "hms-server")]
#[command(about = "Hospital management system API server")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HMS_CONFIG", default_value = "hms.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,

    /// Do not apply database migrations at startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = std::path::Path::new(&cli.config).exists().then_some(cli.config.as_str());
    let mut config = HmsConfig::load(config_path)?;
    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }

    init_logging(&config);
    if config_path.is_none() {
        warn!("Config file not found, using defaults and environment: {}", cli.config);
    }

    info!("Starting HMS server ({:?} profile)", config.profile);
    info!("Bind address: {}", config.server.bind_address);

    config.validate()?;
    info!("Configuration validated successfully");

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    info!("Initializing database connections...");
    let db_manager = Arc::new(DatabaseManager::new(&config.database, &config.redis).await?);
    info!("Database connections initialized successfully");

    if config.database.run_migrations && !cli.skip_migrations {
        db_manager.postgres.run_migrations().await?;
    }

    let state = ApiState::new(db_manager.clone(), Arc::new(config))?;
    let api_server = api::start_server(state).await?;

    let postgres = db_manager.postgres.clone();
    let purge_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BLACKLIST_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match postgres.purge_expired_blacklist().await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired blacklisted token(s)", purged),
                Err(e) => error!("Token blacklist purge failed: {}", e),
            }
        }
    });

    info!("HMS server started successfully. Press Ctrl+C to shutdown.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = api_server => {
            if let Err(e) = result {
                error!("API server task error: {}", e);
            }
        }
    }

    purge_handle.abort();
    info!("Shutting down HMS server");
    Ok(())
}

fn init_logging(config: &HmsConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("hms_server={},tower_http=info", config.logging.level).into()
    });

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
