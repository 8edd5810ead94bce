use serde::{Deserialize, Serialize};

/// Identity and network coordinates of a single cluster member.
///
/// Mirrors the wire form exchanged over the coordination store and in
/// control messages: `{"id","ip","port","max_connections","is_master",
/// "health_check_port","log_file_path"}`. Credentials are carried
/// alongside but never serialized onto the wire — they are opaque to
/// every component that only sees a `NodeDescriptor`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: String,
    pub ip: String,
    pub port: u16,
    pub max_connections: usize,
    pub is_master: bool,
    pub health_check_port: u16,
    #[serde(default)]
    pub log_file_path: Option<String>,

    /// Local-only credentials. Never present on the wire.
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
}

impl NodeDescriptor {
    /// Generates a fresh identity with a random 128-bit id, rendered as a
    /// canonical UUID string.
    pub fn new(ip: String, port: u16) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ip,
            port,
            max_connections: 0,
            is_master: false,
            health_check_port: 0,
            log_file_path: None,
            username: None,
            password_hash: None,
        }
    }

    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn health_addr_string(&self) -> String {
        format!("{}:{}", self.ip, self.health_check_port)
    }
}
