use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::StateStoreError;
use crate::op::WriteOp;

/// KV store holding job state. Writes go through batches; reads are single
/// commands used by the read path and by tests.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Open a batch handle. Dropping the handle releases it.
    fn batch(&self) -> Box<dyn WriteBatch>;

    // Strings
    async fn get_string(&self, key: &str) -> Result<Option<String>, StateStoreError>;

    // Hashes (empty map when missing)
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StateStoreError>;

    // Lists
    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError>;
    async fn list_len(&self, key: &str) -> Result<u64, StateStoreError>;

    // Sorted sets, ordered by score then member
    async fn sorted_set_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StateStoreError>;
    async fn sorted_set_rank(&self, key: &str, member: &str)
    -> Result<Option<u64>, StateStoreError>;
    async fn sorted_set_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError>;

    // Key lifecycle
    async fn exists(&self, key: &str) -> Result<bool, StateStoreError>;
    /// Remaining time to live; `None` for missing keys and keys without one.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StateStoreError>;

    // Health
    async fn ping(&self) -> Result<bool, StateStoreError>;

    async fn close(&self) -> Result<(), StateStoreError>;
}

/// Atomic multi-command unit. Either every op applies or none does, and no
/// other batch interleaves with it.
#[async_trait]
pub trait WriteBatch: Send {
    async fn execute(&mut self, ops: Vec<WriteOp>) -> Result<(), StateStoreError>;
}

/// Wakes consumers waiting on a channel. Delivery carries no guarantee beyond
/// "something changed".
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StateStoreError>;
}

#[derive(Debug, Clone)]
pub struct StateStoreConfig {
    pub url: String,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}
