use std::time::Duration;

use async_trait::async_trait;
use etcd_client::Client;

use crate::error::DiscoveryError;

/// How long a single coordination-store call is allowed to take before the
/// caller treats it as failed.
pub const COORDINATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Sentinel key used by [`CoordinationStore::health`] to probe liveness
/// without depending on any real node having registered yet.
pub const HEALTH_SENTINEL_KEY: &str = "/kv/_health";

/// The external system nodes use to find each other. Implemented against
/// etcd in production; a test double can stand in without touching the
/// rest of the discovery/election logic.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<(), DiscoveryError>;
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, DiscoveryError>;
    async fn delete(&self, key: &str) -> Result<(), DiscoveryError>;
    async fn health(&self) -> Result<(), DiscoveryError>;
}

/// A [`CoordinationStore`] backed by an etcd cluster.
pub struct EtcdCoordinationStore {
    client: Client,
}

impl EtcdCoordinationStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self, DiscoveryError> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CoordinationStore for EtcdCoordinationStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), DiscoveryError> {
        let mut client = self.client.clone();
        tokio::time::timeout(COORDINATION_TIMEOUT, client.put(key, value, None))
            .await
            .map_err(|_| DiscoveryError::Timeout)?
            .map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, DiscoveryError> {
        let mut client = self.client.clone();
        let options = etcd_client::GetOptions::new().with_prefix();
        let response = tokio::time::timeout(
            COORDINATION_TIMEOUT,
            client.get(prefix, Some(options)),
        )
        .await
        .map_err(|_| DiscoveryError::Timeout)?
        .map_err(|e| DiscoveryError::Store(e.to_string()))?;

        let mut entries = Vec::new();
        for kv in response.kvs() {
            entries.push((
                String::from_utf8_lossy(kv.key()).into_owned(),
                String::from_utf8_lossy(kv.value()).into_owned(),
            ));
        }
        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<(), DiscoveryError> {
        let mut client = self.client.clone();
        tokio::time::timeout(COORDINATION_TIMEOUT, client.delete(key, None))
            .await
            .map_err(|_| DiscoveryError::Timeout)?
            .map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(())
    }

    async fn health(&self) -> Result<(), DiscoveryError> {
        let mut client = self.client.clone();
        tokio::time::timeout(COORDINATION_TIMEOUT, client.get(HEALTH_SENTINEL_KEY, None))
            .await
            .map_err(|_| DiscoveryError::Timeout)?
            .map_err(|e| DiscoveryError::Store(e.to_string()))?;
        Ok(())
    }
}
