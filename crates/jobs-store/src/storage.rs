use std::collections::HashMap;
use std::sync::Arc;

use gbe_jobs_domain::keys::fields;
use gbe_jobs_domain::{HistoryEntry, KeySpace};
use gbe_state_store::{Notifier, StateStore};

use crate::error::{JobStoreError, require};
use crate::transaction::WriteTransaction;

#[derive(Debug, Clone, Default)]
pub struct JobStorageOptions {
    /// Prepended to every key and channel. Empty by default.
    pub prefix: String,
}

/// Entry point to job storage on one store.
///
/// Holds the store and notifier shared by every transaction it opens; neither
/// is closed when a transaction finishes.
pub struct JobStorage {
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    keys: KeySpace,
}

impl JobStorage {
    pub fn new(
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        options: JobStorageOptions,
    ) -> Self {
        Self {
            store,
            notifier,
            keys: KeySpace::new(options.prefix),
        }
    }

    /// Use one backend as both store and notifier.
    pub fn from_store<S>(store: Arc<S>, options: JobStorageOptions) -> Self
    where
        S: StateStore + Notifier + 'static,
    {
        Self::new(store.clone(), store, options)
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Open a transaction on a fresh batch handle.
    pub fn write_transaction(&self) -> WriteTransaction {
        WriteTransaction::new(self.store.batch(), self.notifier.clone(), self.keys.clone())
    }

    /// Name of the job's current state, from the job record.
    pub async fn job_state_name(&self, job_id: &str) -> Result<Option<String>, JobStoreError> {
        require(job_id, "job_id")?;
        let mut record = self.store.get_hash(&self.keys.job(job_id)).await?;
        Ok(record.remove(fields::STATE))
    }

    /// Fields of the job's current state: `Reason` plus the state data.
    pub async fn job_current_state(
        &self,
        job_id: &str,
    ) -> Result<HashMap<String, String>, JobStoreError> {
        require(job_id, "job_id")?;
        Ok(self.store.get_hash(&self.keys.job_state(job_id)).await?)
    }

    /// Every recorded transition, oldest first.
    pub async fn job_history(&self, job_id: &str) -> Result<Vec<HistoryEntry>, JobStoreError> {
        require(job_id, "job_id")?;
        let raw = self
            .store
            .list_range(&self.keys.job_history(job_id), 0, -1)
            .await?;
        raw.iter()
            .map(|entry| HistoryEntry::decode(entry).map_err(JobStoreError::from))
            .collect()
    }
}
