//! The write path that ties an [`Engine`] to a [`Wal`]: every mutation is
//! durable before it is visible, and a fresh process replays the log before
//! serving any request.

use std::sync::Arc;

use kv_engine::{Engine, EngineError};
use kv_wal::{Operation, Wal, WalError};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Durable storage pipeline: append-then-apply writes, lock-free-for-reads.
pub struct StoragePipeline<E: Engine> {
    engine: RwLock<E>,
    wal: Wal,
}

impl<E: Engine> StoragePipeline<E> {
    pub fn new(engine: E, wal: Wal) -> Arc<Self> {
        Arc::new(Self {
            engine: RwLock::new(engine),
            wal,
        })
    }

    /// Replays the WAL into the engine. Must run before the pipeline is
    /// handed to the transport layer; replayed mutations do not re-enter
    /// the WAL.
    pub async fn recover(&self) -> Result<(), StorageError> {
        let entries = self.wal.recover()?;
        let mut engine = self.engine.write().await;
        for entry in entries {
            match entry.operation {
                Operation::Set => {
                    if let Some(value) = entry.value.as_deref() {
                        engine.set(&entry.key, value);
                    }
                }
                Operation::Delete => engine.delete(&entry.key),
            }
        }
        Ok(())
    }

    /// Appends a `Set` record to the WAL, then applies it to the engine.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.wal
            .append(Operation::Set, key.to_string(), Some(value.to_string()))
            .await?;
        self.engine.write().await.set(key, value);
        Ok(())
    }

    /// Bypasses the WAL; concurrent writers are serialized behind `set`/`delete`.
    pub async fn get(&self, key: &str) -> Result<String, StorageError> {
        Ok(self.engine.read().await.get(key)?)
    }

    /// Appends a `Delete` record to the WAL, then applies it to the engine.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.wal
            .append(Operation::Delete, key.to_string(), None)
            .await?;
        self.engine.write().await.delete(key);
        Ok(())
    }

    pub fn wal(&self) -> &Wal {
        &self.wal
    }
}
