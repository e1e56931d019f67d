//! syncd — client-side sync daemon. Watches local source objects per
//! configured Kind and reconciles them against a server over a single
//! shared transport connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use sync_agent::{DirWatcher, WatchLoop};
use sync_core::reconciler::{Reconciler, ReconcilerConfig};
use sync_core::SyncConfig;
use sync_transport::TcpTransport;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    SyncConfig::write_default_if_missing().context("failed to write default config")?;
    let config = SyncConfig::load().context("failed to load config")?;
    tracing::info!(cluster = %config.cluster, resources = config.resources.len(), "syncd starting");

    let transport = TcpTransport::connect(&config.transport.endpoint, config.transport.max_frame, config.transport.timeout())
        .await
        .with_context(|| format!("failed to connect to {}", config.transport.endpoint))?;

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    for resource in &config.resources {
        let kind = resource.kind();
        let strategy = resource.strategy().context("invalid strategy in config")?;
        let reconciler_config = ReconcilerConfig {
            cluster: config.cluster.clone(),
            kind: kind.clone(),
            strategy,
            ignored_paths: config.hasher.ignored_paths.clone(),
            transport_timeout: config.transport.timeout(),
        };
        let reconciler = Reconciler::new(reconciler_config, transport.clone());

        let source_dir: std::path::PathBuf = config.watch.source_dir.join(kind.to_string().replace('/', "__"));
        let watcher = Arc::new(DirWatcher::new(source_dir, config.watch.poll_interval()));
        let watch_loop = WatchLoop::new(watcher, reconciler, kind.clone(), cancel.clone());

        let transport_for_task = transport.clone();
        tasks.push(tokio::spawn(async move {
            watch_loop.run(transport_for_task).await;
        }));
    }

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
