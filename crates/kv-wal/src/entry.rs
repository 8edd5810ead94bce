use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Set,
    Delete,
}

/// One durable record: a mutation plus the sequence number assigned to it
/// at append time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub operation: Operation,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub sequence: u64,
}
