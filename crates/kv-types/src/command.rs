use uuid::Uuid;

/// The verb of a parsed data command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Get,
    Delete,
    /// A verb the codec did not recognize. The router rejects these.
    Unknown,
}

impl CommandKind {
    pub fn from_verb(verb: &str) -> Self {
        match verb {
            "SET" => CommandKind::Set,
            "GET" => CommandKind::Get,
            "DEL" => CommandKind::Delete,
            _ => CommandKind::Unknown,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            CommandKind::Set => "SET",
            CommandKind::Get => "GET",
            CommandKind::Delete => "DEL",
            CommandKind::Unknown => "UNKNOWN",
        }
    }
}

/// A single parsed data command (`SET`/`GET`/`DEL`).
///
/// Carries a fresh id per parse, used as the replication payload's
/// identity and for tracing correlation.
#[derive(Clone, Debug)]
pub struct Command {
    pub id: Uuid,
    pub kind: CommandKind,
    pub key: String,
    pub value: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind, key: String, value: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            key,
            value,
        }
    }
}
