//! Inbound sync service: consumes peer-region change events from the bus,
//! materializes them into the local store, and serves sync observability.

mod api;
mod config;
mod sync;

use std::future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use regionsync_bus_kafka::BusConsumer;
use regionsync_core::SyncMetrics;
use regionsync_storage_postgres::{connect, PgSink};

use api::AppState;
use config::AppConfig;
use sync::processor::ChangeProcessor;

/// How long an in-flight message may finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    info!(
        region = %config.regions.local,
        peer = %config.regions.peer,
        "starting inbound sync service"
    );

    // The sink is load-bearing: unreachable means exit non-zero.
    let pool = connect(&config.store)
        .await
        .context("sink database unreachable at startup")?;
    let sink = PgSink::new(pool.clone());
    let metrics = Arc::new(SyncMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The bus is not: an unreachable broker leaves the read API up, without
    // sync, until the next restart.
    let mut consumer: Option<JoinHandle<anyhow::Result<()>>> =
        match BusConsumer::connect(&config.bus, &sync::sync_topics()).await {
            Ok(bus) => {
                let processor =
                    ChangeProcessor::new(config.regions.clone(), sink.clone(), metrics.clone());
                Some(tokio::spawn(sync::run_consumer(
                    bus,
                    processor,
                    shutdown_rx.clone(),
                )))
            }
            Err(err) => {
                warn!("bus unreachable at startup, continuing without sync: {err}");
                None
            }
        };

    let state = AppState {
        regions: config.regions.clone(),
        metrics: metrics.clone(),
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind read API port {}", config.http_port))?;
    info!("read API listening on :{}", config.http_port);

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, api::router(state))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    let cause = {
        // Pends forever when no consumer was started, leaving only signals.
        let consumer_done = async {
            match consumer.as_mut() {
                Some(task) => task
                    .await
                    .unwrap_or_else(|join_err| Err(anyhow!("consumer task aborted: {join_err}"))),
                None => future::pending().await,
            }
        };
        tokio::select! {
            _ = shutdown_signal() => ExitCause::Signal,
            result = consumer_done => ExitCause::ConsumerDone(result),
        }
    };

    let exit = match cause {
        ExitCause::Signal => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            if let Some(handle) = consumer.take() {
                match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(err))) => warn!("consumer ended with error during shutdown: {err:#}"),
                    Ok(Err(join_err)) => warn!("consumer task aborted: {join_err}"),
                    Err(_) => warn!("consumer did not stop within {SHUTDOWN_GRACE:?}"),
                }
            }
            Ok(())
        }
        ExitCause::ConsumerDone(result) => {
            let _ = shutdown_tx.send(true);
            match result {
                Ok(()) => Ok(()),
                Err(err) => {
                    error!("sync consumer failed: {err:#}");
                    Err(err)
                }
            }
        }
    };

    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    pool.close().await;
    if exit.is_ok() {
        info!("clean shutdown");
    }
    exit
}

enum ExitCause {
    Signal,
    ConsumerDone(anyhow::Result<()>),
}

fn init_logging() {
    // Library crates log through `log`; bridge them into tracing.
    let _ = tracing_log::LogTracer::init();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
