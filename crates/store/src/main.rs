use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use store::cli::{self, Cli};
use store::{telemetry, ConnectionPool, RecordStore, StoreConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Phase 1: thread-local subscriber while the configuration loads
    let basic_tracing = telemetry::init_basic();

    let config = StoreConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    debug!("Loaded configuration: {:?}", config);

    drop(basic_tracing);

    // Phase 2: global subscriber from the loaded configuration
    telemetry::init_from_config(&config.logging).context("Failed to initialize tracing")?;

    let store = if cli.command.needs_store() {
        let database = config.database.clone();
        let store = tokio::task::spawn_blocking(move || {
            ConnectionPool::from_config(&database).and_then(RecordStore::new)
        })
        .await
        .context("Database setup task panicked")?
        .with_context(|| format!("Failed to open database '{}'", config.database.name))?;
        info!(
            "Opened database '{}' (pool size {})",
            config.database.name, config.database.pool_size
        );
        Some(store)
    } else {
        None
    };

    cli::run(cli.command, store).await
}
