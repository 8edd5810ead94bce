//! Fire-and-forget delivery of a single framed line to a peer address.
//!
//! Used by both the replicator (broadcasting mutations) and discovery
//! (sending `IAM` announcements) — neither keeps a persistent connection to
//! peers; each send dials fresh, writes, and closes.

use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum PeerLinkError {
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },
    #[error("io error talking to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials `addr` (`ip:port`) and writes `payload` followed by a trailing
/// newline if one isn't already present, then closes the connection.
pub async fn send_line(addr: &str, payload: &[u8]) -> Result<(), PeerLinkError> {
    let mut stream = timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| PeerLinkError::ConnectTimeout { addr: addr.into() })?
        .map_err(|source| PeerLinkError::Io {
            addr: addr.into(),
            source,
        })?;

    stream
        .write_all(payload)
        .await
        .map_err(|source| PeerLinkError::Io {
            addr: addr.into(),
            source,
        })?;

    if !payload.ends_with(b"\n") {
        stream
            .write_all(b"\n")
            .await
            .map_err(|source| PeerLinkError::Io {
                addr: addr.into(),
                source,
            })?;
    }

    stream.flush().await.map_err(|source| PeerLinkError::Io {
        addr: addr.into(),
        source,
    })
}
