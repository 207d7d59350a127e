//! Postmesh daemon -- wallet-signed message relay node.
//!
//! Usage:
//!
//!   postmesh-daemon [OPTIONS]
//!
//! Options:
//!
//!   --http-port <PORT>     HTTP listen port (default: 6612)
//!   --p2p-port <PORT>      Peer transport port (default: 9000)
//!   --peer-id <PATH>       Peer identity file (generated when missing)
//!   --swarm-key <PATH>     Private swarm key file
//!   --bootstrap <ADDR>     Add a bootstrap multiaddr (repeatable)
//!   --topic <NAME>         Gossip sync topic (default: sync-topic)
//!   --config <PATH>        Load config from JSON file
//!
//! Environment:
//!
//!   P2P_BOOTSTRAPPERS      Comma-separated bootstrap multiaddrs
//!
//! The daemon runs until interrupted with Ctrl+C (SIGINT/SIGTERM).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use postmesh_dispatch::{ServiceRegistry, StoreDispatcher, TransferService};
use postmesh_http::{
    build_router, AdmissionConfig, AdmissionController, AppState, HttpServer,
};
use postmesh_relay::{GossipRelay, RelayOptions, SwarmDriver};
use postmesh_store::memory::MemoryEntityStore;
use postmesh_store::{ServiceKind, StoreMethodDirectory};
use postmesh_types::Result;

mod config;
mod sync;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = config::CliArgs::parse_from_env();
    let daemon_config = match config::DaemonConfig::resolve(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("failed to resolve configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_daemon(daemon_config).await {
        tracing::error!("daemon error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Daemon main logic
// ---------------------------------------------------------------------------

async fn run_daemon(cfg: config::DaemonConfig) -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Store services and dispatch pipeline
    // -----------------------------------------------------------------------

    let mut registry = ServiceRegistry::new();
    for kind in ServiceKind::ALL {
        registry = registry.register(kind, Arc::new(MemoryEntityStore::new(kind)));
    }
    let transfer = Arc::new(TransferService::new(StoreDispatcher::new(
        registry,
        Arc::new(StoreMethodDirectory),
    )));

    tracing::info!(domains = ServiceKind::ALL.len(), "store services registered");

    // -----------------------------------------------------------------------
    // 2. Relay
    // -----------------------------------------------------------------------

    let driver = Arc::new(SwarmDriver::new());
    let relay = Arc::new(GossipRelay::new(cfg.sync_topic.clone(), driver)?);

    let mut options = RelayOptions::builder()
        .port(cfg.p2p_port)
        .bootstrap_addresses(cfg.bootstrap.clone())
        .announce_addresses(cfg.announce.clone())
        .discovery_topics(cfg.discovery_topics.clone());
    if let Some(path) = &cfg.peer_id_file {
        options = options.peer_id_file(path);
    }
    if let Some(path) = &cfg.swarm_key_file {
        options = options.swarm_key_file(path);
    }

    relay
        .start(
            &options.build(),
            Some(sync::broadcast_callback(transfer.clone())),
        )
        .await?;

    tracing::info!(
        topic = %cfg.sync_topic,
        p2p_port = cfg.p2p_port,
        bootstrap_count = cfg.bootstrap.len(),
        "relay started"
    );

    // -----------------------------------------------------------------------
    // 3. HTTP server
    // -----------------------------------------------------------------------

    let state = AppState {
        transfer,
        admission: Arc::new(AdmissionController::new(AdmissionConfig::default())),
        on_store_dispatched: Some(sync::publish_hook(relay.clone())),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_addr: SocketAddr = ([0, 0, 0, 0], cfg.http_port).into();
    let mut http_handle =
        HttpServer::start(http_addr, build_router(Arc::new(state)), shutdown_rx).await?;

    // -----------------------------------------------------------------------
    // 4. Status summary
    // -----------------------------------------------------------------------

    println!();
    println!("============================================================");
    println!("  Postmesh relay running");
    println!("============================================================");
    println!("  HTTP listen:  {http_addr}");
    println!("  P2P port:     {}", cfg.p2p_port);
    println!("  Sync topic:   {}", cfg.sync_topic);
    println!("  Bootstrap:    {} peer(s)", cfg.bootstrap.len());
    println!("============================================================");
    println!("  Press Ctrl+C to stop");
    println!("============================================================");
    println!();

    // -----------------------------------------------------------------------
    // 5. Wait for shutdown signal
    // -----------------------------------------------------------------------

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down...");
        }
        result = &mut http_handle => {
            match result {
                Ok(()) => tracing::error!("HTTP server exited unexpectedly"),
                Err(e) => tracing::error!(%e, "HTTP server panicked"),
            }
        }
    }

    // Stop accepting HTTP traffic, then stop the monitor.
    let _ = shutdown_tx.send(true);
    relay.shutdown().await;

    // Brief grace period for in-flight requests.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    tracing::info!("daemon stopped");
    Ok(())
}
