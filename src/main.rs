mod api;
mod config;
mod db;
mod error;
mod ingest;
mod scan;
mod scrape;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::ScanScheduler;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Cooperative shutdown ---
    // Ctrl-C flips the watch; the scheduler cuts its sleep short and the API
    // server drains. An in-flight persist step finishes before the loop exits.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // --- Hourly ingestion loop ---
    info!(
        "Scan source: {} (every {}s, retention {}h)",
        cfg.scan_url, cfg.scan_interval_secs, cfg.retention_hours,
    );
    let scheduler = ScanScheduler::new(cfg.clone(), pool.clone(), shutdown_rx.clone());
    let scheduler_handle = tokio::spawn(scheduler.run());

    // --- HTTP API server ---
    let app = router(ApiState { pool, cfg: cfg.clone() });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let mut api_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = api_shutdown.changed().await;
        })
        .await?;

    let _ = scheduler_handle.await;
    Ok(())
}
