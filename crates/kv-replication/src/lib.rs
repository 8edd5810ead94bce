//! Fire-and-forget broadcast of mutations to peers, with a bloom filter to
//! suppress replicating a payload this node has already sent or received.

use std::sync::Arc;

use kv_bloom::BloomFilter;
use kv_topology::Topology;
use kv_types::NodeDescriptor;
use thiserror::Error;
use tokio::sync::Mutex;

/// Expected distinct payloads tracked by the dedup filter over one process
/// lifetime. Never reset except by restarting the node.
pub const BLOOM_CAPACITY: usize = 20_000;
pub const BLOOM_FP_RATE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Reserved for a catastrophic local failure (e.g. the dedup filter
    /// becoming unusable). Per-peer send failures never surface here —
    /// they are logged and swallowed.
    #[error("replication error: {0}")]
    Internal(String),
}

/// Broadcasts raw command lines to every other known node, deduplicated
/// against a bloom filter so a payload already seen isn't re-sent.
pub struct Replicator {
    seen: Mutex<BloomFilter>,
}

impl Replicator {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(BloomFilter::new(BLOOM_CAPACITY, BLOOM_FP_RATE)),
        }
    }

    /// Replicates `payload` to every node in `topology` other than
    /// `self_desc`. A payload the filter already recognizes is treated as
    /// already replicated and not sent again.
    pub async fn replicate(
        &self,
        self_desc: &NodeDescriptor,
        topology: &Topology,
        payload: &[u8],
    ) -> Result<(), ReplicationError> {
        let mut seen = self.seen.lock().await;
        if seen.may_contain(payload) {
            return Ok(());
        }

        for peer in topology.get_all_nodes().await {
            if peer.id == self_desc.id {
                continue;
            }
            if let Err(err) = kv_peerlink::send_line(&peer.socket_addr_string(), payload).await {
                tracing::warn!(error = %err, peer = %peer.id, "failed to replicate to peer");
            }
        }

        seen.insert(payload);
        Ok(())
    }
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new()
    }
}
