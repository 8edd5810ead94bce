use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("coordination store error: {0}")]
    Store(String),

    #[error("coordination store timed out")]
    Timeout,

    #[error("malformed node descriptor: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("peer link error: {0}")]
    PeerLink(#[from] kv_peerlink::PeerLinkError),
}
