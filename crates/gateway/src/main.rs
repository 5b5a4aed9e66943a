// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use diagnostics::{info, warn};
use gateway::Config;
use std::sync::Arc;
use tierfs::{LocalTier, ObjectStoreRemote, RemoteStore, RemoteTier, TierCoordinator, probe_remote};

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init();
    let config = Config::parse();

    let local = LocalTier::ensure_root(&config.local_root)
        .await
        .with_context(|| format!("preparing local root {}", config.local_root.display()))?;

    let remote = match config.remote() {
        Some(remote_config) => {
            let store = ObjectStoreRemote::connect(&remote_config)
                .with_context(|| format!("configuring remote {remote_config:?}"))?;
            probe_remote(&store, config.probe_timeout())
                .await
                .context("probing remote tier")?;
            let label = store.describe();
            info!("Remote tier enabled: {#[emit::as_display] label}");

            let store: Arc<dyn RemoteStore> = Arc::new(store);
            Some(RemoteTier {
                store,
                push: config.push(),
                pull_timeout: config.pull_timeout(),
            })
        }
        None => {
            warn!("No remote configured, running with the local tier only");
            None
        }
    };

    let coordinator = Arc::new(TierCoordinator::new(local, remote));
    let app = gateway::router(coordinator.clone());

    let listener = tokio::net::TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.bind, config.port))?;
    let addr = listener.local_addr()?.to_string();
    info!("Server is running on http://{#[emit::as_display] addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Draining pending pushes");
    coordinator.shutdown().await;
    let stats = coordinator.push_stats();
    let pushed = stats.pushed;
    let failed = stats.failed;
    let dropped = stats.dropped;
    info!("Push totals: {pushed} pushed, {failed} failed, {dropped} dropped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for shutdown signal: {#[emit::as_display] err}");
        std::future::pending::<()>().await;
    }
}
