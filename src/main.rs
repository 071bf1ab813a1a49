//! Bootstraps the configured backend and prints the occupancy report as JSON.

use anyhow::Result;
use roomalloc::{bootstrap, config::Config, engine::AllocationEngine};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let config = Config::from_env()?;

    // RUST_LOG wins over ROOMALLOC_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let backend = bootstrap::select_backend(&config.store)?;
    info!(backend = %backend.kind(), "allocation store ready");

    let engine = AllocationEngine::new(backend);
    let report = engine.report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
