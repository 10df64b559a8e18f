//! Listener fleet: one accept loop per discovered public port
//!
//! Binding follows the teacher's "log and continue past a per-resource
//! failure" pattern from discovery; shutdown follows the ambient
//! ctrl_c/SIGTERM handling every long-running daemon in the corpus installs.

use crate::error::{CoreError, Result};
use crate::handler;
use crate::registry::ChallengeRegistry;
use cproxy_driver::ComposeDriver;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind a listener for every descriptor in `registry` and accept connections
/// until the process receives a shutdown signal. Never returns `Err` for a
/// single bad port — only a fault in the supervisor's own setup propagates.
pub async fn run(registry: Arc<ChallengeRegistry>, driver: Arc<dyn ComposeDriver>) -> Result<()> {
    let mut listener_tasks = Vec::new();

    for public_port in registry.public_ports() {
        match TcpListener::bind(("0.0.0.0", public_port)).await {
            Ok(listener) => {
                tracing::info!(port = public_port, "listening");
                let reg = registry.clone();
                let drv = driver.clone();
                listener_tasks.push(tokio::spawn(accept_loop(listener, public_port, reg, drv)));
            }
            Err(source) => {
                let err = CoreError::Bind {
                    port: public_port,
                    source,
                };
                tracing::error!(port = public_port, error = %err, "failed to bind port; continuing");
            }
        }
    }

    if listener_tasks.is_empty() {
        tracing::warn!("no listeners bound; idling until shutdown signal");
    }

    wait_for_shutdown().await;
    tracing::info!("shutdown signal received; closing listeners");

    for task in listener_tasks {
        task.abort();
    }

    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    public_port: u16,
    registry: Arc<ChallengeRegistry>,
    driver: Arc<dyn ComposeDriver>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let reg = registry.clone();
                let drv = driver.clone();
                tokio::spawn(async move {
                    handler::handle(stream, public_port, reg, drv).await;
                });
            }
            Err(e) => {
                tracing::warn!(port = public_port, error = %e, "accept error; continuing");
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
