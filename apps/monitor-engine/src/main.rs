//! Monitor Engine Binary
//!
//! Starts the Vigil monitoring engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin monitor-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `AMQP_URL`: Broker connection URL
//! - `API_BASE_URL`: Management API base URL, e.g. `http://api:8000/api`
//!
//! ## Optional
//! - `REDIS_HOST`: Key-value store host (default: 127.0.0.1)
//! - `REDIS_PORT`: Key-value store port (default: 6379)
//! - `REDIS_PASSWORD`: Key-value store password
//! - `FEED_CHANNELS`: Comma-separated feed channels (default: `kline:BTCUSDT`)
//! - `BROKER_PREFETCH`: In-flight delivery cap (default: 64)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use monitor_engine::broker::BrokerConsumer;
use monitor_engine::config::EngineConfig;
use monitor_engine::dispatch::{Wire, build};
use monitor_engine::feed::FeedListener;
use monitor_engine::loader::InitialLoader;
use monitor_engine::store::RedisStateStore;
use monitor_engine::telemetry::init_tracing;
use monitor_engine::HttpApiClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("Starting Vigil monitor engine");

    let config = EngineConfig::from_env()?;
    log_config(&config);

    let store = Arc::new(RedisStateStore::connect(&config.store).await?);
    let api = Arc::new(HttpApiClient::new(&config.api)?);
    let shutdown = CancellationToken::new();

    let wires = build(&api, &store);

    // Seed the buffers before any live traffic arrives.
    let loader = InitialLoader::new(Arc::clone(&api));
    for wire in &wires {
        loader.seed(wire.kind, &wire.buffer).await;
    }
    tracing::info!("Initial data load complete");

    let mut consumer = BrokerConsumer::new(&config.broker, shutdown.clone());
    for wire in &wires {
        consumer.register(wire.queue, Arc::clone(&wire.buffer));
    }
    let consumer = Arc::new(consumer);
    // Connect exhaustion here is the engine's one fatal startup error.
    consumer.connect().await?;

    let broker_handle = tokio::spawn({
        let consumer = Arc::clone(&consumer);
        async move { consumer.run().await }
    });

    let buffers = wires.iter().map(|wire| Arc::clone(&wire.buffer)).collect();
    let mut listener = FeedListener::new(&config.feed, buffers, shutdown.clone())?;
    for wire in &wires {
        for channel in &config.feed.channels {
            listener.register(channel.clone(), Arc::clone(&wire.handler));
        }
    }
    log_bindings(&wires, &config.feed.channels);

    let listener_handle = tokio::spawn(async move { listener.run().await });

    tracing::info!("Monitor engine ready");

    shutdown_signal().await;
    shutdown.cancel();

    consumer.close().await;
    let _ = listener_handle.await;
    let _ = broker_handle.await;

    tracing::info!("Monitor engine stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        api_base_url = %config.api.base_url,
        redis_host = %config.store.host,
        channels = ?config.feed.channels,
        prefetch = config.broker.prefetch,
        "Configuration loaded"
    );
}

/// Log the trigger/channel/queue binding table.
fn log_bindings(wires: &[Wire], channels: &[String]) {
    for wire in wires {
        for channel in channels {
            tracing::info!(
                kind = %wire.kind,
                channel = %channel,
                queue = %wire.queue,
                "Bound dispatch trigger"
            );
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed: a process that cannot
/// respond to termination signals is worse than one that fails fast at
/// startup.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
