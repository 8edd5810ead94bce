//! The cluster membership map: every node this process currently knows
//! about, including itself, keyed by node id.

use std::collections::HashMap;

use kv_types::NodeDescriptor;
use tokio::sync::RwLock;

/// Thread-safe membership table shared between discovery, replication, and
/// the router.
///
/// The master flag on an entry is only ever flipped by the election routine
/// in `kv-discovery` — nothing else in this crate interprets or mutates it.
#[derive(Default)]
pub struct Topology {
    nodes: RwLock<HashMap<String, NodeDescriptor>>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_node(&self, node: NodeDescriptor) {
        self.nodes.write().await.insert(node.id.clone(), node);
    }

    pub async fn remove_node(&self, id: &str) -> Option<NodeDescriptor> {
        self.nodes.write().await.remove(id)
    }

    pub async fn get_node(&self, id: &str) -> Option<NodeDescriptor> {
        self.nodes.read().await.get(id).cloned()
    }

    /// An independent snapshot — later mutations to the topology are not
    /// observed through the returned vector.
    pub async fn get_all_nodes(&self) -> Vec<NodeDescriptor> {
        self.nodes.read().await.values().cloned().collect()
    }

    pub async fn get_master(&self) -> Option<NodeDescriptor> {
        self.nodes
            .read()
            .await
            .values()
            .find(|n| n.is_master)
            .cloned()
    }

    pub async fn count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.nodes.read().await.contains_key(id)
    }

    pub async fn clear(&self) {
        self.nodes.write().await.clear();
    }

    /// Replaces the stored entry for `node.id` in place, used by the
    /// election routine after it flips a node's master flag.
    pub async fn update_node(&self, node: NodeDescriptor) {
        self.nodes.write().await.insert(node.id.clone(), node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeDescriptor {
        let mut n = NodeDescriptor::new("127.0.0.1".into(), 9000);
        n.id = id.to_string();
        n
    }

    #[tokio::test]
    async fn add_then_get_returns_the_node() {
        let topology = Topology::new();
        topology.add_node(node("a")).await;
        assert!(topology.get_node("a").await.is_some());
    }

    #[tokio::test]
    async fn remove_node_drops_it_from_the_map() {
        let topology = Topology::new();
        topology.add_node(node("a")).await;
        topology.remove_node("a").await;
        assert!(topology.get_node("a").await.is_none());
    }

    #[tokio::test]
    async fn get_all_nodes_is_an_independent_snapshot() {
        let topology = Topology::new();
        topology.add_node(node("a")).await;
        let snapshot = topology.get_all_nodes().await;
        topology.add_node(node("b")).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(topology.count().await, 2);
    }

    #[tokio::test]
    async fn get_master_finds_the_flagged_node() {
        let topology = Topology::new();
        topology.add_node(node("a")).await;
        let mut master = node("b");
        master.is_master = true;
        topology.add_node(master).await;

        let found = topology.get_master().await.unwrap();
        assert_eq!(found.id, "b");
    }

    #[tokio::test]
    async fn contains_and_clear() {
        let topology = Topology::new();
        topology.add_node(node("a")).await;
        assert!(topology.contains("a").await);
        topology.clear().await;
        assert!(!topology.contains("a").await);
        assert_eq!(topology.count().await, 0);
    }
}
