use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use gbe_jobs_domain::keys::fields;
use gbe_jobs_domain::{HistoryEntry, JobStateRecord, KeySpace, current_state_fields, unix_millis};
use gbe_state_store::{AddMode, Notifier, StateStoreError, WriteBatch, WriteOp};

use crate::error::{JobStoreError, require};

/// Result of a successful commit.
#[derive(Debug)]
pub struct CommitSummary {
    /// Number of store commands applied.
    pub operations: usize,
    /// Queues whose consumers were notified.
    pub notified: Vec<String>,
    /// Queues whose notification failed. The data is committed regardless;
    /// consumers of these queues may sleep until their next poll.
    pub missed_notifications: Vec<MissedNotification>,
}

#[derive(Debug)]
pub struct MissedNotification {
    pub queue: String,
    pub error: StateStoreError,
}

/// Write-only transaction over job storage.
///
/// Every mutation validates its arguments immediately and queues one or more
/// store commands; nothing reaches the store until [`commit`](Self::commit),
/// which submits the whole queue as one atomic batch. Calling a mutation twice
/// queues it twice.
///
/// Key layout (all prefixed by the [`KeySpace`]):
/// - `job:{id}` job record, `State` field holds the current state name
/// - `job:{id}:state` current state hash, replaced on every transition
/// - `job:{id}:history` history list, appended on the right (index 0 is oldest)
/// - `queues` sorted set of queue names, scored by first sighting
/// - `queue:{name}` job ids, pushed on the left; consumers pop from the right
///
/// Dropping an uncommitted transaction discards its commands and releases the
/// batch handle.
pub struct WriteTransaction {
    keys: KeySpace,
    batch: Box<dyn WriteBatch>,
    notifier: Arc<dyn Notifier>,
    ops: Vec<WriteOp>,
    queues: BTreeSet<String>,
    queue_seq: u64,
}

impl WriteTransaction {
    pub fn new(batch: Box<dyn WriteBatch>, notifier: Arc<dyn Notifier>, keys: KeySpace) -> Self {
        Self {
            keys,
            batch,
            notifier,
            ops: Vec::new(),
            queues: BTreeSet::new(),
            queue_seq: 0,
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Commands queued so far, in execution order.
    pub fn pending(&self) -> &[WriteOp] {
        &self.ops
    }

    // -- Jobs --

    /// Expire the job record, its state hash and its history together.
    pub fn expire_job(&mut self, job_id: &str, ttl: Duration) -> Result<(), JobStoreError> {
        require(job_id, "job_id")?;
        for key in self.keys.job_keys(job_id) {
            self.ops.push(WriteOp::Expire { key, ttl });
        }
        Ok(())
    }

    /// Remove the expiration from all three job keys.
    pub fn persist_job(&mut self, job_id: &str) -> Result<(), JobStoreError> {
        require(job_id, "job_id")?;
        for key in self.keys.job_keys(job_id) {
            self.ops.push(WriteOp::Persist { key });
        }
        Ok(())
    }

    /// Make `state` the job's current state.
    ///
    /// Sets `State` on the job record and replaces the state hash: it is
    /// deleted and rewritten in the same batch, so no field of the previous
    /// state survives.
    pub fn set_job_state(
        &mut self,
        job_id: &str,
        state: &dyn JobStateRecord,
    ) -> Result<(), JobStoreError> {
        require(job_id, "job_id")?;
        require(state.name(), "state")?;

        let state_key = self.keys.job_state(job_id);
        self.ops.push(WriteOp::HashSet {
            key: self.keys.job(job_id),
            field: fields::STATE.to_string(),
            value: state.name().to_string(),
        });
        self.ops.push(WriteOp::Delete {
            key: state_key.clone(),
        });
        self.ops.push(WriteOp::HashSetMany {
            key: state_key,
            fields: current_state_fields(state).into_iter().collect(),
        });
        Ok(())
    }

    /// Append `state` to the job's history without touching the current state.
    ///
    /// `CreatedAt` is stamped now, not at commit.
    pub fn add_job_state(
        &mut self,
        job_id: &str,
        state: &dyn JobStateRecord,
    ) -> Result<(), JobStoreError> {
        require(job_id, "job_id")?;
        require(state.name(), "state")?;

        let entry = HistoryEntry::from_state(state, unix_millis());
        self.ops.push(WriteOp::ListPushRight {
            key: self.keys.job_history(job_id),
            value: entry.encode()?,
        });
        Ok(())
    }

    // -- Queues --

    /// Register `queue` and push `job_id` onto it. Consumers of the queue are
    /// notified after a successful commit.
    ///
    /// The queue name is scored only if it is new to the `queues` set, so
    /// enumeration follows first sighting. Scores strictly increase within a
    /// transaction: each call adds its position to the millisecond timestamp.
    pub fn add_to_queue(&mut self, queue: &str, job_id: &str) -> Result<(), JobStoreError> {
        require(queue, "queue")?;
        require(job_id, "job_id")?;

        let score = self.next_queue_score();
        self.ops.push(WriteOp::SortedSetAdd {
            key: self.keys.queues(),
            member: queue.to_string(),
            score,
            mode: AddMode::IfAbsent,
        });
        self.ops.push(WriteOp::ListPushLeft {
            key: self.keys.queue(queue),
            value: job_id.to_string(),
        });
        self.queues.insert(queue.to_string());
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)] // exact in f64 until year 2255
    fn next_queue_score(&mut self) -> f64 {
        let score = unix_millis() * 1000 + self.queue_seq;
        self.queue_seq += 1;
        score as f64
    }

    // -- Counters --

    pub fn increment_counter(
        &mut self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<(), JobStoreError> {
        self.counter(key, 1, ttl)
    }

    pub fn decrement_counter(
        &mut self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<(), JobStoreError> {
        self.counter(key, -1, ttl)
    }

    fn counter(&mut self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<(), JobStoreError> {
        require(key, "key")?;
        let key = self.keys.key(key);
        if let Some(ttl) = ttl {
            self.ops.push(WriteOp::Increment {
                key: key.clone(),
                delta,
            });
            self.ops.push(WriteOp::Expire { key, ttl });
        } else {
            self.ops.push(WriteOp::Increment { key, delta });
        }
        Ok(())
    }

    // -- Sorted sets --

    /// Add `value` with score 0.
    pub fn add_to_set(&mut self, key: &str, value: &str) -> Result<(), JobStoreError> {
        self.add_to_set_with_score(key, value, 0.0)
    }

    pub fn add_to_set_with_score(
        &mut self,
        key: &str,
        value: &str,
        score: f64,
    ) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::SortedSetAdd {
            key: self.keys.key(key),
            member: value.to_string(),
            score,
            mode: AddMode::Upsert,
        });
        Ok(())
    }

    /// Add every item with score 0.
    pub fn add_range_to_set<I>(&mut self, key: &str, items: I) -> Result<(), JobStoreError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        require(key, "key")?;
        let key = self.keys.key(key);
        for item in items {
            self.ops.push(WriteOp::SortedSetAdd {
                key: key.clone(),
                member: item.into(),
                score: 0.0,
                mode: AddMode::Upsert,
            });
        }
        Ok(())
    }

    pub fn remove_from_set(&mut self, key: &str, value: &str) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::SortedSetRemove {
            key: self.keys.key(key),
            member: value.to_string(),
        });
        Ok(())
    }

    pub fn remove_set(&mut self, key: &str) -> Result<(), JobStoreError> {
        self.delete(key)
    }

    // -- Lists --

    /// Prepend `value`; it becomes index 0.
    pub fn insert_to_list(&mut self, key: &str, value: &str) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::ListPushLeft {
            key: self.keys.key(key),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Remove every occurrence of `value`.
    pub fn remove_from_list(&mut self, key: &str, value: &str) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::ListRemove {
            key: self.keys.key(key),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Keep only indices `keep_start..=keep_end`; negative indices count from
    /// the end of the list at commit time.
    pub fn trim_list(
        &mut self,
        key: &str,
        keep_start: i64,
        keep_end: i64,
    ) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::ListTrim {
            key: self.keys.key(key),
            start: keep_start,
            stop: keep_end,
        });
        Ok(())
    }

    // -- Hashes --

    /// Set many hash fields at once. An empty pair set queues nothing.
    pub fn set_range_in_hash<I, K, V>(
        &mut self,
        key: &str,
        key_value_pairs: I,
    ) -> Result<(), JobStoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        require(key, "key")?;
        let fields: Vec<(String, String)> = key_value_pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if fields.is_empty() {
            return Ok(());
        }
        self.ops.push(WriteOp::HashSetMany {
            key: self.keys.key(key),
            fields,
        });
        Ok(())
    }

    pub fn remove_hash(&mut self, key: &str) -> Result<(), JobStoreError> {
        self.delete(key)
    }

    // -- Expiration of generic entities --

    pub fn expire_hash(&mut self, key: &str, ttl: Duration) -> Result<(), JobStoreError> {
        self.expire(key, ttl)
    }

    pub fn expire_set(&mut self, key: &str, ttl: Duration) -> Result<(), JobStoreError> {
        self.expire(key, ttl)
    }

    pub fn expire_list(&mut self, key: &str, ttl: Duration) -> Result<(), JobStoreError> {
        self.expire(key, ttl)
    }

    pub fn persist_hash(&mut self, key: &str) -> Result<(), JobStoreError> {
        self.persist(key)
    }

    pub fn persist_set(&mut self, key: &str) -> Result<(), JobStoreError> {
        self.persist(key)
    }

    pub fn persist_list(&mut self, key: &str) -> Result<(), JobStoreError> {
        self.persist(key)
    }

    fn expire(&mut self, key: &str, ttl: Duration) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::Expire {
            key: self.keys.key(key),
            ttl,
        });
        Ok(())
    }

    fn persist(&mut self, key: &str) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::Persist {
            key: self.keys.key(key),
        });
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), JobStoreError> {
        require(key, "key")?;
        self.ops.push(WriteOp::Delete {
            key: self.keys.key(key),
        });
        Ok(())
    }

    // -- Commit --

    /// Submit every queued command as one atomic batch, then notify each
    /// distinct queue touched by [`add_to_queue`](Self::add_to_queue).
    ///
    /// Consumes the transaction, so it commits at most once.
    ///
    /// # Errors
    /// Returns `JobStoreError::Store` if the batch fails; no notification is
    /// sent. Whether earlier commands of a failed batch stay applied is up to
    /// the backend (see its docs). Notification failures are not errors:
    /// they are logged and listed in [`CommitSummary::missed_notifications`].
    pub async fn commit(mut self) -> Result<CommitSummary, JobStoreError> {
        let ops = std::mem::take(&mut self.ops);
        let queues = std::mem::take(&mut self.queues);
        let operations = ops.len();

        if !ops.is_empty() {
            self.batch.execute(ops).await?;
        }
        tracing::debug!(operations, queues = queues.len(), "write transaction committed");

        let mut summary = CommitSummary {
            operations,
            notified: Vec::with_capacity(queues.len()),
            missed_notifications: Vec::new(),
        };
        for queue in queues {
            let channel = self.keys.queue_channel(&queue);
            match self.notifier.publish(&channel, &queue).await {
                Ok(()) => summary.notified.push(queue),
                Err(error) => {
                    tracing::warn!(queue = %queue, channel = %channel, "queue notification failed after commit: {error}");
                    summary
                        .missed_notifications
                        .push(MissedNotification { queue, error });
                }
            }
        }
        Ok(summary)
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            tracing::debug!(
                operations = self.ops.len(),
                "write transaction dropped without commit"
            );
        }
    }
}
