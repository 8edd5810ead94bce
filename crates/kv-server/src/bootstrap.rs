use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use kv_discovery::{Discovery, EtcdCoordinationStore};
use kv_engine::InMemoryEngine;
use kv_replication::Replicator;
use kv_router::CommandRouter;
use kv_storage::StoragePipeline;
use kv_topology::Topology;
use kv_transport::ListenerStatus;
use kv_types::NodeDescriptor;
use tokio_util::sync::CancellationToken;

/// Default etcd endpoint used when `ETCD_ENDPOINTS` is unset. The node's
/// own config file intentionally carries no coordination-store setting —
/// that's cluster-wide infrastructure, not per-node config.
const DEFAULT_ETCD_ENDPOINT: &str = "http://127.0.0.1:2379";

fn etcd_endpoints() -> Vec<String> {
    match std::env::var("ETCD_ENDPOINTS") {
        Ok(value) => value.split(',').map(str::to_string).collect(),
        Err(_) => vec![DEFAULT_ETCD_ENDPOINT.to_string()],
    }
}

/// Builds every component leaves-first, runs discovery and recovery, then
/// serves the transport and health endpoint until shutdown is signaled.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let raw_config = kv_config::load(config_path)?;

    let mut self_desc = NodeDescriptor::new(raw_config.ip.clone(), raw_config.port);
    self_desc.max_connections = raw_config.max_connections;
    self_desc.health_check_port = raw_config.health_check_port;
    self_desc.log_file_path = raw_config
        .log_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    self_desc.username = raw_config.username.clone();
    self_desc.password_hash = raw_config.password_hash.clone();

    let engine = InMemoryEngine::new();
    let wal = kv_wal::Wal::open(&raw_config.wal_path)?;
    let pipeline = StoragePipeline::new(engine, wal.clone());
    pipeline.recover().await?;
    tracing::info!("storage pipeline recovered from wal");

    let shutdown = CancellationToken::new();
    wal.spawn_background_tasks(shutdown.clone());

    let topology = Arc::new(Topology::new());
    let store = Arc::new(EtcdCoordinationStore::connect(&etcd_endpoints()).await?);
    let discovery = Arc::new(Discovery::new(store, topology.clone()));

    discovery.discover_peers().await?;
    let self_desc = discovery.register_self(self_desc).await?;
    let self_desc = Arc::new(self_desc);
    tracing::info!(node_id = %self_desc.id, is_master = self_desc.is_master, "node registered");

    let replicator = Arc::new(Replicator::new());
    let router = Arc::new(CommandRouter::new(pipeline.clone(), replicator, topology));

    let listener_status = ListenerStatus::new();
    let bind_addr: SocketAddr = self_desc.socket_addr_string().parse()?;
    let health_addr: SocketAddr = self_desc.health_addr_string().parse()?;

    let transport_task = tokio::spawn(kv_transport::serve(
        bind_addr,
        router,
        self_desc,
        listener_status.clone(),
        shutdown.clone(),
    ));
    let health_task = tokio::spawn(kv_health::serve(
        health_addr,
        listener_status,
        discovery,
        shutdown.clone(),
    ));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        signal_shutdown.cancel();
    });

    let (transport_result, health_result) = tokio::join!(transport_task, health_task);
    transport_result??;
    health_result??;

    wal.close().await?;
    tracing::info!("wal closed, shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
