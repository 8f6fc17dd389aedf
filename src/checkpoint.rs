//! # Checkpoint store.
//!
//! Durable key → offset map with a monotonic write guarantee. A write that
//! would lower the stored offset is rejected with
//! [`CheckpointError::Regression`] and leaves the stored value untouched; an
//! equal write succeeds. This is what makes concurrent commits from two
//! short-lived leaders during a handoff safe.
//!
//! [`MemoryCheckpointStore`] implements the contract in process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CheckpointError;

/// Durable offset storage keyed by stream identity.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the stored offset for `key`, or 0 if the key is unknown.
    async fn load(&self, key: &str) -> Result<u64, CheckpointError>;

    /// Stores `offset` for `key` unless it is lower than the stored value.
    async fn save(&self, key: &str, offset: u64) -> Result<(), CheckpointError>;
}

/// In-memory [`CheckpointStore`].
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    offsets: RwLock<HashMap<String, u64>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored offset without the `0` default.
    pub async fn get(&self, key: &str) -> Option<u64> {
        self.offsets.read().await.get(key).copied()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<u64, CheckpointError> {
        Ok(self.get(key).await.unwrap_or(0))
    }

    async fn save(&self, key: &str, offset: u64) -> Result<(), CheckpointError> {
        let mut offsets = self.offsets.write().await;
        match offsets.get(key) {
            Some(&stored) if offset < stored => Err(CheckpointError::Regression {
                key: key.to_string(),
                stored,
                attempted: offset,
            }),
            _ => {
                offsets.insert(key.to_string(), offset);
                Ok(())
            }
        }
    }
}
