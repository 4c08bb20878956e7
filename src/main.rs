//! user-profile-service: outbox worker
//!
//! Connects to PostgreSQL, optionally applies migrations and keeps draining
//! committed event-log batches into the event store until Ctrl-C.
//!
//! ## Configuration
//! - UPS__DATABASE__URL: PostgreSQL connection string
//! - UPS__OUTBOX__POLL_INTERVAL_MS: pause between drain cycles
//! - UPS__TELEMETRY__LOG_LEVEL / RUST_LOG: log filter
//!
//! On unix, SIGHUP reloads the configuration and applies a changed poll
//! interval without restarting the worker.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use user_profile_service::adapters::{PostgresEventLog, PostgresEventStore};
use user_profile_service::application::{OutboxProcessor, OutboxWorker, RetryPolicy};
use user_profile_service::config::{AppConfig, OutboxConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.telemetry.init()?;
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    info!("Starting user-profile-service outbox worker");

    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    let processor = Arc::new(
        OutboxProcessor::new(
            Arc::new(PostgresEventLog::new(pool.clone())),
            Arc::new(PostgresEventStore::new(pool.clone())),
        )
        .with_retry_policy(RetryPolicy::from(&config.outbox)),
    );

    let (config_tx, config_rx) = watch::channel(config.outbox.clone());
    let shutdown = CancellationToken::new();
    let worker = OutboxWorker::new(processor, config_rx).spawn(shutdown.clone());

    tokio::spawn(reload_on_hangup(config_tx, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = worker.await {
        error!(error = %e, "Outbox worker panicked");
    }
    pool.close().await;
    info!("Stopped");
    Ok(())
}

#[cfg(unix)]
async fn reload_on_hangup(config_tx: watch::Sender<OutboxConfig>, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGHUP, configuration reload disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
            }
        }

        match AppConfig::load() {
            Ok(reloaded) => match reloaded.outbox.validate() {
                Ok(()) => {
                    config_tx.send_if_modified(|current| {
                        if *current == reloaded.outbox {
                            return false;
                        }
                        *current = reloaded.outbox.clone();
                        true
                    });
                    info!(
                        poll_interval_ms = reloaded.outbox.poll_interval_ms,
                        "Configuration reloaded"
                    );
                }
                Err(e) => error!(error = %e, "Reloaded outbox configuration rejected"),
            },
            Err(e) => error!(error = %e, "Failed to reload configuration"),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_config_tx: watch::Sender<OutboxConfig>, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}
