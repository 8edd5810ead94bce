use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed wal entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Reserved for a checksum-validated WAL variant; the reference
    /// implementation treats any malformed record as clean end-of-file
    /// rather than raising this.
    #[error("corrupt wal record")]
    #[allow(dead_code)]
    Corrupt,
}
