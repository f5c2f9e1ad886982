use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

use gbe_state_store::{Notifier, StateStore, StateStoreError, WriteBatch, WriteOp};

use crate::keyspace::{Keyspace, Value, resolve_range};

type SharedKeyspace = Arc<Mutex<Keyspace>>;

/// A message handed to [`Notifier::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub message: String,
}

/// Oldest messages are dropped past this many.
pub const PUBLISHED_LOG_CAPACITY: usize = 1024;

#[derive(Default)]
struct Channels {
    waiters: HashMap<String, Arc<Notify>>,
    published: VecDeque<Published>,
}

/// In-process store with Redis semantics for the commands job storage uses.
///
/// Clones share the same data, so one instance can serve as both the store and
/// the notifier of a `JobStorage`.
#[derive(Clone)]
pub struct MemoryStateStore {
    keyspace: SharedKeyspace,
    channels: Arc<Mutex<Channels>>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace::default())),
            channels: Arc::new(Mutex::new(Channels::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that is woken whenever something is published on `channel`.
    pub async fn subscribe(&self, channel: &str) -> Arc<Notify> {
        self.channels
            .lock()
            .await
            .waiters
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Recently published messages, oldest first. At most
    /// [`PUBLISHED_LOG_CAPACITY`] are kept.
    pub async fn published(&self) -> Vec<Published> {
        self.channels.lock().await.published.iter().cloned().collect()
    }

    /// Drain the published-message log.
    pub async fn take_published(&self) -> Vec<Published> {
        self.channels.lock().await.published.drain(..).collect()
    }

    fn check_closed(&self) -> Result<(), StateStoreError> {
        check_closed(&self.closed)
    }
}

fn check_closed(closed: &AtomicBool) -> Result<(), StateStoreError> {
    if closed.load(Ordering::Acquire) {
        return Err(StateStoreError::Other("store is closed".to_string()));
    }
    Ok(())
}

/// Batch handle over the shared keyspace.
pub(crate) struct MemoryBatch {
    keyspace: SharedKeyspace,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl WriteBatch for MemoryBatch {
    async fn execute(&mut self, ops: Vec<WriteOp>) -> Result<(), StateStoreError> {
        check_closed(&self.closed)?;
        let now = Instant::now();
        let mut live = self.keyspace.lock().await;

        // Apply to a scratch copy so a failing op leaves no trace.
        let mut scratch = live.clone();
        for op in &ops {
            scratch.apply(op, now)?;
        }
        *live = scratch;

        tracing::trace!(ops = ops.len(), "memory batch applied");
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemoryBatch {
            keyspace: self.keyspace.clone(),
            closed: self.closed.clone(),
        })
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(resolve_range(list.len(), start, stop)
                .map(|(from, to)| list.range(from..=to).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn sorted_set_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::SortedSet(set)) => Ok(set.get(member).copied()),
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn sorted_set_rank(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<u64>, StateStoreError> {
        let members = self.sorted_set_range(key, 0, -1).await?;
        Ok(members
            .iter()
            .position(|m| m == member)
            .map(|rank| rank as u64))
    }

    async fn sorted_set_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        match ks.get(key, Instant::now()).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(set)) => {
                let mut ordered: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
                ordered.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
                Ok(resolve_range(ordered.len(), start, stop)
                    .map(|(from, to)| {
                        ordered[from..=to]
                            .iter()
                            .map(|(m, _)| (*m).clone())
                            .collect()
                    })
                    .unwrap_or_default())
            }
            Some(_) => Err(StateStoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StateStoreError> {
        self.check_closed()?;
        let mut ks = self.keyspace.lock().await;
        Ok(ks.get(key, Instant::now()).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StateStoreError> {
        self.check_closed()?;
        let now = Instant::now();
        let mut ks = self.keyspace.lock().await;
        Ok(ks
            .get(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn ping(&self) -> Result<bool, StateStoreError> {
        Ok(!self.closed.load(Ordering::Acquire))
    }

    async fn close(&self) -> Result<(), StateStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl Notifier for MemoryStateStore {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StateStoreError> {
        self.check_closed()?;
        let mut channels = self.channels.lock().await;
        if channels.published.len() == PUBLISHED_LOG_CAPACITY {
            channels.published.pop_front();
        }
        channels.published.push_back(Published {
            channel: channel.to_string(),
            message: message.to_string(),
        });
        if let Some(waiters) = channels.waiters.get(channel) {
            waiters.notify_waiters();
        }
        Ok(())
    }
}
