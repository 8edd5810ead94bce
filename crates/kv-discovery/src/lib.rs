//! Cluster membership discovery and leader election, layered over an
//! external [`CoordinationStore`] and a local [`Topology`].

mod error;
mod store;

pub use error::DiscoveryError;
pub use store::{CoordinationStore, EtcdCoordinationStore, COORDINATION_TIMEOUT, HEALTH_SENTINEL_KEY};

use std::sync::Arc;

use kv_types::{ControlKind, ControlMessage, NodeDescriptor};
use kv_topology::Topology;

const KEY_PREFIX: &str = "/kv/";

fn node_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Discovery and election over one cluster, bound to one coordination
/// store and one local topology view.
pub struct Discovery<S: CoordinationStore> {
    store: Arc<S>,
    topology: Arc<Topology>,
}

impl<S: CoordinationStore> Discovery<S> {
    pub fn new(store: Arc<S>, topology: Arc<Topology>) -> Self {
        Self { store, topology }
    }

    /// Range-scans the coordination store and populates the local topology.
    /// Called once at startup, before `register_self`.
    pub async fn discover_peers(&self) -> Result<(), DiscoveryError> {
        for (_key, value) in self.store.get_prefix(KEY_PREFIX).await? {
            match serde_json::from_str::<NodeDescriptor>(&value) {
                Ok(node) => self.topology.add_node(node).await,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed node descriptor during discovery");
                }
            }
        }
        Ok(())
    }

    /// Registers `self_desc` with the cluster: joins the local topology,
    /// runs election, publishes the (possibly now-master) descriptor to the
    /// coordination store, and announces itself to every known peer.
    ///
    /// Returns the descriptor as stored in the topology after election, so
    /// the caller picks up an `is_master` flip.
    pub async fn register_self(
        &self,
        self_desc: NodeDescriptor,
    ) -> Result<NodeDescriptor, DiscoveryError> {
        let self_id = self_desc.id.clone();
        self.topology.add_node(self_desc).await;

        self.choose_leader().await?;

        let self_desc = self
            .topology
            .get_node(&self_id)
            .await
            .expect("just inserted");

        let payload = serde_json::to_string(&self_desc)?;
        self.store.put(&node_key(&self_id), &payload).await?;

        for peer in self.topology.get_all_nodes().await {
            if peer.id == self_id {
                continue;
            }
            let message = ControlMessage::new(ControlKind::Iam, peer.clone(), self_desc.clone());
            let line = match serde_json::to_string(&message) {
                Ok(mut l) => {
                    l.push('\n');
                    l
                }
                Err(err) => {
                    tracing::warn!(error = %err, peer = %peer.id, "failed to encode Iam message");
                    continue;
                }
            };
            if let Err(err) = kv_peerlink::send_line(&peer.socket_addr_string(), line.as_bytes()).await {
                tracing::warn!(error = %err, peer = %peer.id, "failed to announce to peer");
            }
        }

        Ok(self_desc)
    }

    /// Returns the current master's id, electing one if none exists yet.
    ///
    /// Deterministic only within one process: concurrent elections on
    /// different nodes may transiently disagree until registrations
    /// propagate through the coordination store.
    pub async fn choose_leader(&self) -> Result<String, DiscoveryError> {
        if let Some(master) = self.topology.get_master().await {
            return Ok(master.id);
        }

        let mut candidate = self
            .topology
            .get_all_nodes()
            .await
            .into_iter()
            .find(|n| !n.is_master);

        match candidate.take() {
            Some(mut node) => {
                node.is_master = true;
                let id = node.id.clone();
                self.topology.update_node(node).await;
                Ok(id)
            }
            None => Ok(String::new()),
        }
    }

    /// Removes a node from the cluster: re-runs election first so a master
    /// still exists afterward, then deletes it from the coordination store
    /// (logged and swallowed on failure) and from the local topology.
    pub async fn remove_node(&self, id: &str) -> Result<(), DiscoveryError> {
        self.choose_leader().await?;

        if let Err(err) = self.store.delete(&node_key(id)).await {
            tracing::warn!(error = %err, node = id, "failed to delete node from coordination store");
        }

        self.topology.remove_node(id).await;
        Ok(())
    }

    /// Probes the coordination store's health, used by `kv-health`.
    pub async fn health(&self) -> Result<(), DiscoveryError> {
        self.store.health().await
    }
}
