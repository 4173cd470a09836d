use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use event_rental_api::{
    app,
    config::Config,
    jobs::{InventoryReconciliationJob, JobScheduler, PoolMetricsJob},
    middleware,
    services::build_dispatcher,
};
use persistence::PgReservationStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    middleware::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    middleware::init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting Event Rental API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;

    persistence::db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = PgReservationStore::new(pool.clone());
    let notifier = build_dispatcher(config.notifications.provider, &pool);
    info!(provider = ?config.notifications.provider, "Notification provider selected");

    let state = app::AppState::new(config.clone(), Arc::new(store), notifier)
        .context("Invalid JWT configuration")?;

    let mut scheduler = JobScheduler::new();
    if config.jobs.enabled {
        scheduler.register(PoolMetricsJob::new(
            pool.clone(),
            config.jobs.pool_metrics_interval_secs,
        ));
        scheduler.register(InventoryReconciliationJob::new(
            state.catalog.ledger().clone(),
            config.jobs.reconcile_interval_minutes,
            config.jobs.reconcile_repair,
        ));
        scheduler.start();
    } else {
        warn!("Background jobs disabled");
    }

    let app = app::router(state);

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    pool.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
