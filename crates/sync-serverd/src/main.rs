//! sync-serverd — server-side replica daemon. Accepts client connections
//! on a single TCP listener, drives a shared [`Replica`] keyed by
//! (Kind, Key), and serves the admin HTTP API alongside it.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use sync_agent::Replica;
use sync_api::ApiState;
use sync_core::SyncConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    SyncConfig::write_default_if_missing().context("failed to write default config")?;
    let config = SyncConfig::load().context("failed to load config")?;
    tracing::info!(cluster = %config.cluster, resources = config.resources.len(), "sync-serverd starting");

    let replica = Arc::new(Replica::new(config.hasher.ignored_paths.clone()));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let api_state = ApiState { replica: replica.clone(), started_at: Instant::now(), shutdown_tx: shutdown_tx.clone() };
    let api_port = config.api.port;
    let api_task = tokio::spawn(async move {
        if let Err(err) = sync_api::serve(api_state, api_port).await {
            tracing::error!(error = %err, "admin API exited");
        }
    });

    let listener = TcpListener::bind(&config.transport.endpoint)
        .await
        .with_context(|| format!("failed to bind {}", config.transport.endpoint))?;
    tracing::info!(addr = %config.transport.endpoint, "accepting sync connections");

    let max_frame = config.transport.max_frame;
    let idle_timeout = config.transport.timeout();
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept failed")?;
                tracing::info!(%peer, "client connected");
                let replica = replica.clone();
                tokio::spawn(async move {
                    sync_agent::server::serve_connection(stream, replica, max_frame, idle_timeout).await;
                });
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown requested, stopping listener");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    api_task.abort();
    Ok(())
}
