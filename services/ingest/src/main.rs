use std::sync::Arc;

use anyhow::Context as _;
use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use inlet_core::clock::{Clock, SystemClock};
use inlet_core::config::Config;
use inlet_core::tracing::init_tracing;

use inlet_ingest::config::IngestConfig;
use inlet_ingest::infra::db::DbEventStore;
use inlet_ingest::router::build_router;
use inlet_ingest::state::AppState;
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

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = DbEventStore { db };
    let verifiers = config.verifier_registry(clock.clone());
    info!(providers = ?verifiers.providers().collect::<Vec<_>>(), "verifiers registered");

    let shutdown = CancellationToken::new();

    // Scheduler alongside the HTTP server
    let scheduler = config.worker_enabled.then(|| {
        let scheduler = Scheduler::new(
            Arc::new(store.clone()),
            Arc::new(TracingEventHandler),
            clock.clone(),
            config.scheduler_config(),
            shutdown.clone(),
        );
        tokio::spawn(async move { scheduler.run().await })
    });

    // HTTP server
    let state = AppState {
        store,
        verifiers: Arc::new(verifiers),
        clock,
    };
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.ingest_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("ingest service listening on {addr}");
    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            signal.cancel();
        })
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        handle.await.context("scheduler task panicked")?;
    }
    Ok(())
}
