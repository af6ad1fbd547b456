//! # Orderdesk Main Entry Point
//!
//! Boots the ingestion service: configuration, telemetry, database pool and
//! migrations, the background notification worker, and the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use orderdesk::config::ConfigLoader;
use orderdesk::notify::TelegramTransport;
use orderdesk::queue::NotificationWorker;
use orderdesk::server::run_server;
use orderdesk::{db, telemetry};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(ConfigLoader::new().load()?);
    config.validate()?;

    telemetry::init_tracing(&config)?;
    if let Ok(redacted) = config.redacted_json() {
        tracing::info!(profile = %config.profile, "Loaded configuration: {}", redacted);
    }

    let pool = db::init_pool(&config).await?;
    Migrator::up(&pool, None).await?;

    let shutdown = CancellationToken::new();

    let transport = Arc::new(TelegramTransport::new(
        config.telegram_api_base.clone(),
        config.telegram_bot_token.clone(),
        Duration::from_millis(config.outbound_timeout_ms),
    )?);
    let worker = NotificationWorker::new(Arc::clone(&config), pool.clone(), transport);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            ctrl_c_shutdown.cancel();
        }
    });

    let result = run_server(Arc::clone(&config), pool).await;

    shutdown.cancel();
    let _ = worker_handle.await;

    result
}
