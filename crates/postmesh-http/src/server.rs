//! HTTP server entry point.
//!
//! [`HttpServer::start`] binds the listener, spawns the serve loop as a
//! tokio task and returns its `JoinHandle`. Shutdown is signalled
//! through a `watch` channel: the server stops accepting connections
//! and drains in-flight requests.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use postmesh_types::{PostmeshError, Result};

/// Returns a future that resolves when the shutdown watch fires.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if rx.changed().await.is_err() {
            break;
        }
        if *rx.borrow() {
            break;
        }
    }
}

/// Manages the lifecycle of the HTTP server.
pub struct HttpServer;

impl HttpServer {
    /// Binds `addr` and serves `router` until shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns `PostmeshError::NetworkError` if the address cannot be
    /// bound.
    pub async fn start(
        addr: SocketAddr,
        router: Router,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PostmeshError::NetworkError {
                reason: format!("failed to bind HTTP listener on {addr}: {e}"),
            })?;

        tracing::info!(%addr, "HTTP server listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await;

            if let Err(e) = result {
                tracing::error!(%e, "HTTP server error");
            }
            tracing::info!("HTTP server stopped");
        });

        Ok(handle)
    }
}
