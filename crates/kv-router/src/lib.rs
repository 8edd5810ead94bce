//! Dispatches a decoded line to the storage pipeline, replicator, or
//! topology, and formats the reply.

use std::sync::Arc;

use kv_codec::{encode_response, Decoded};
use kv_engine::Engine;
use kv_replication::Replicator;
use kv_storage::StoragePipeline;
use kv_topology::Topology;
use kv_types::{CommandKind, ControlKind, NodeDescriptor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("unknown command verb")]
    UnknownVerb,

    #[error("storage error: {0}")]
    Storage(#[from] kv_storage::StorageError),
}

impl RouterError {
    /// The single-line response a connection handler should write back for
    /// this error, per the dispatch table's fixed reply strings.
    pub fn response_bytes(&self) -> Vec<u8> {
        match self {
            RouterError::UnknownVerb => UNKNOWN_COMMAND.to_vec(),
            RouterError::Storage(err) => format!("error: {err}\n").into_bytes(),
        }
    }
}

const WRITE_OK: &[u8] = b"write successfull\n";
const DELETE_OK: &[u8] = b"delete successfull\n";
const KEY_NOT_FOUND: &[u8] = b"key not found\n";
const UNKNOWN_COMMAND: &[u8] = b"unknown command\n";

/// Ties the codec's output to the storage pipeline, replicator, and
/// topology, and produces the bytes to write back on the connection.
pub struct CommandRouter<E: Engine> {
    pipeline: Arc<StoragePipeline<E>>,
    replicator: Arc<Replicator>,
    topology: Arc<Topology>,
}

impl<E: Engine> CommandRouter<E> {
    pub fn new(
        pipeline: Arc<StoragePipeline<E>>,
        replicator: Arc<Replicator>,
        topology: Arc<Topology>,
    ) -> Self {
        Self {
            pipeline,
            replicator,
            topology,
        }
    }

    pub async fn handle(
        &self,
        decoded: Decoded,
        self_desc: &NodeDescriptor,
    ) -> Result<Vec<u8>, RouterError> {
        match &decoded {
            Decoded::Data(command) => match command.kind {
                CommandKind::Set => {
                    let value = command.value.as_deref().unwrap_or_default();
                    self.pipeline.set(&command.key, value).await?;
                    let raw = encode_response(&decoded);
                    self.replicator
                        .replicate(self_desc, &self.topology, &raw)
                        .await
                        .ok();
                    Ok(WRITE_OK.to_vec())
                }
                CommandKind::Get => match self.pipeline.get(&command.key).await {
                    Ok(value) => {
                        let mut response = value.into_bytes();
                        response.push(b'\n');
                        Ok(response)
                    }
                    Err(_) => Ok(KEY_NOT_FOUND.to_vec()),
                },
                CommandKind::Delete => {
                    self.pipeline.delete(&command.key).await?;
                    let raw = encode_response(&decoded);
                    self.replicator
                        .replicate(self_desc, &self.topology, &raw)
                        .await
                        .ok();
                    Ok(DELETE_OK.to_vec())
                }
                CommandKind::Unknown => Err(RouterError::UnknownVerb),
            },
            Decoded::Control(message) => {
                match message.command {
                    ControlKind::Iam => {
                        self.topology.add_node(message.sent_from.clone()).await;
                    }
                    ControlKind::HealthCheck | ControlKind::Echo | ControlKind::Stop => {
                        // reserved for future use
                    }
                }
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_codec::decode_line;
    use kv_engine::InMemoryEngine;
    use kv_types::{Command, ControlMessage};

    async fn router(dir: &tempfile::TempDir) -> (CommandRouter<InMemoryEngine>, NodeDescriptor) {
        let wal = kv_wal::Wal::open(dir.path().join("wal.log")).unwrap();
        let pipeline = StoragePipeline::new(InMemoryEngine::new(), wal);
        let replicator = Arc::new(Replicator::new());
        let topology = Arc::new(Topology::new());
        let self_desc = NodeDescriptor::new("127.0.0.1".into(), 9000);
        topology.add_node(self_desc.clone()).await;
        (CommandRouter::new(pipeline, replicator, topology), self_desc)
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_the_router() {
        let dir = tempfile::tempdir().unwrap();
        let (router, self_desc) = router(&dir).await;

        let set = decode_line("SET foo bar").unwrap();
        let reply = router.handle(set, &self_desc).await.unwrap();
        assert_eq!(reply, WRITE_OK);

        let get = decode_line("GET foo").unwrap();
        let reply = router.handle(get, &self_desc).await.unwrap();
        assert_eq!(reply, b"bar\n");
    }

    #[tokio::test]
    async fn get_of_missing_key_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (router, self_desc) = router(&dir).await;

        let get = decode_line("GET missing").unwrap();
        let reply = router.handle(get, &self_desc).await.unwrap();
        assert_eq!(reply, KEY_NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let (router, self_desc) = router(&dir).await;

        router
            .handle(decode_line("SET foo bar").unwrap(), &self_desc)
            .await
            .unwrap();
        let reply = router
            .handle(decode_line("DEL foo").unwrap(), &self_desc)
            .await
            .unwrap();
        assert_eq!(reply, DELETE_OK);

        let reply = router
            .handle(decode_line("GET foo").unwrap(), &self_desc)
            .await
            .unwrap();
        assert_eq!(reply, KEY_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_verb_is_rejected_with_a_fixed_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (router, self_desc) = router(&dir).await;

        let decoded = Decoded::Data(Command::new(CommandKind::Unknown, "x".into(), None));
        let err = router.handle(decoded, &self_desc).await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownVerb));
        assert_eq!(err.response_bytes(), UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn iam_control_message_adds_the_sender_to_topology() {
        let dir = tempfile::tempdir().unwrap();
        let (router, self_desc) = router(&dir).await;
        let topology = router.topology.clone();

        let peer = NodeDescriptor::new("10.0.0.2".into(), 9001);
        let message = ControlMessage::new(
            kv_types::ControlKind::Iam,
            self_desc.clone(),
            peer.clone(),
        );
        router
            .handle(Decoded::Control(message), &self_desc)
            .await
            .unwrap();

        assert!(topology.contains(&peer.id).await);
    }
}
