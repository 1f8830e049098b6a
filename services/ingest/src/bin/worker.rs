//! Scheduler-only process. Run several against one database to scale
//! processing independently of ingestion.

use std::sync::Arc;

use anyhow::Context as _;
use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use inlet_core::clock::SystemClock;
use inlet_core::config::Config;
use inlet_core::tracing::init_tracing;

use inlet_ingest::config::IngestConfig;
use inlet_ingest::infra::db::DbEventStore;
use inlet_ingest::worker::handler::TracingEventHandler;
use inlet_ingest::worker::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = IngestConfig::from_env()
        .context("failed to load configuration")?
        .validate()
        .context("invalid configuration")?;

    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        Arc::new(DbEventStore { db }),
        Arc::new(TracingEventHandler),
        Arc::new(SystemClock),
        config.scheduler_config(),
        shutdown.clone(),
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        signal.cancel();
    });

    scheduler.run().await;
    Ok(())
}
