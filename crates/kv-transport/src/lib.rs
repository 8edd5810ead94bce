//! The raw TCP front door: one Tokio task per connection, reading
//! newline-terminated lines and writing the router's replies back.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kv_codec::decode_line;
use kv_engine::Engine;
use kv_router::CommandRouter;
use kv_types::NodeDescriptor;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Whether the listener is currently bound and accepting connections.
/// Shared with `kv-health` so `/health` can report transport liveness.
#[derive(Clone, Default)]
pub struct ListenerStatus(Arc<AtomicBool>);

impl ListenerStatus {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Exposed so tests (including downstream crates like `kv-health`) can
    /// simulate listener state without binding a real socket.
    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }
}

/// Binds `bind_addr` and serves connections until `shutdown` is cancelled.
///
/// New accepts stop as soon as cancellation is observed; connections
/// already open finish the line they're mid-read on before closing.
pub async fn serve<E: Engine + Send + Sync + 'static>(
    bind_addr: SocketAddr,
    router: Arc<CommandRouter<E>>,
    self_desc: Arc<NodeDescriptor>,
    status: ListenerStatus,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;
    status.set(true);
    tracing::info!(%bind_addr, "transport listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer_addr)) => {
                        let router = router.clone();
                        let self_desc = self_desc.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(socket, router, self_desc, conn_shutdown).await;
                        });
                        tracing::debug!(%peer_addr, "accepted connection");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("transport shutting down, no longer accepting connections");
                status.set(false);
                return Ok(());
            }
        }
    }
}

async fn handle_connection<E: Engine + Send + Sync + 'static>(
    socket: TcpStream,
    router: Arc<CommandRouter<E>>,
    self_desc: Arc<NodeDescriptor>,
    shutdown: CancellationToken,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_line(&mut line) => {
                match read {
                    Ok(0) => return,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(error = %err, "connection read error");
                        return;
                    }
                }
            }
            _ = shutdown.cancelled() => return,
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }

        let response = match decode_line(trimmed) {
            Ok(decoded) => match router.handle(decoded, &self_desc).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(error = %err, "command failed");
                    err.response_bytes()
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "malformed line, keeping connection open");
                format!("error: {err}\n").into_bytes()
            }
        };

        if write_half.write_all(&response).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_engine::InMemoryEngine;
    use kv_replication::Replicator;
    use kv_storage::StoragePipeline;
    use kv_topology::Topology;
    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};

    async fn spawn_server(
        dir: &tempfile::TempDir,
    ) -> (SocketAddr, ListenerStatus, CancellationToken) {
        let wal = kv_wal::Wal::open(dir.path().join("wal.log")).unwrap();
        let pipeline = StoragePipeline::new(InMemoryEngine::new(), wal);
        let replicator = Arc::new(Replicator::new());
        let topology = Arc::new(Topology::new());
        let self_desc = Arc::new(NodeDescriptor::new("127.0.0.1".into(), 0));
        let router = Arc::new(CommandRouter::new(pipeline, replicator, topology));
        let status = ListenerStatus::new();
        let shutdown = CancellationToken::new();

        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(bind_addr).await.unwrap();
        let actual_addr = listener.local_addr().unwrap();
        drop(listener);

        let server_status = status.clone();
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            serve(actual_addr, router, self_desc, server_status, server_shutdown)
                .await
                .unwrap();
        });

        // give the listener a moment to bind
        for _ in 0..50 {
            if status.is_up() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        (actual_addr, status, shutdown)
    }

    #[tokio::test]
    async fn set_and_get_over_a_real_connection() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, _status, shutdown) = spawn_server(&dir).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"SET foo bar\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"write successfull\n");

        stream.write_all(b"GET foo\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"bar\n");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn a_malformed_line_keeps_the_connection_open() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, _status, shutdown) = spawn_server(&dir).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"SET foo\n").await.unwrap();
        let mut buf = [0u8; 128];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("error:"));

        stream.write_all(b"SET foo bar\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"write successfull\n");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn shutdown_stops_new_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let (_addr, status, shutdown) = spawn_server(&dir).await;
        assert!(status.is_up());
        shutdown.cancel();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!status.is_up());
    }
}
