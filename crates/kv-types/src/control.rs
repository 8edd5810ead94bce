use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeDescriptor;

/// The verb of a control message, serialized with its `COMM:` prefix so a
/// line-oriented reader can discriminate it from a data command.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlKind {
    #[serde(rename = "COMM:IAM")]
    Iam,
    #[serde(rename = "COMM:HEALTH_CHECK")]
    HealthCheck,
    #[serde(rename = "COMM:ECHO")]
    Echo,
    #[serde(rename = "COMM:STOP")]
    Stop,
}

/// A self-describing inter-node control message.
///
/// Wire form: `{"id","command","send_to","sent_from"}`, one JSON object
/// per line. Unknown fields are tolerated on decode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlMessage {
    pub id: Uuid,
    pub command: ControlKind,
    pub send_to: NodeDescriptor,
    pub sent_from: NodeDescriptor,
}

impl ControlMessage {
    pub fn new(command: ControlKind, send_to: NodeDescriptor, sent_from: NodeDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            send_to,
            sent_from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iam_round_trips() {
        let a = NodeDescriptor::new("127.0.0.1".into(), 1);
        let b = NodeDescriptor::new("127.0.0.1".into(), 2);
        let msg = ControlMessage::new(ControlKind::Iam, b.clone(), a.clone());

        let line = serde_json::to_string(&msg).unwrap();
        assert!(line.contains("COMM:IAM"));

        let decoded: ControlMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded.command, ControlKind::Iam);
        assert_eq!(decoded.sent_from.id, a.id);
        assert_eq!(decoded.send_to.id, b.id);
    }

    #[test]
    fn tolerates_unknown_fields() {
        let a = NodeDescriptor::new("127.0.0.1".into(), 1);
        let line = format!(
            r#"{{"id":"{}","command":"COMM:IAM","send_to":{},"sent_from":{},"extra":1}}"#,
            Uuid::new_v4(),
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&a).unwrap(),
        );
        let decoded: ControlMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded.command, ControlKind::Iam);
    }
}
