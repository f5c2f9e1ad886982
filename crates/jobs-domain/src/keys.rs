//! Store key builders and field name constants for job storage.
//!
//! Every key carries the configured prefix so that deployments sharing one
//! store never touch each other's data. The read path must build keys through
//! the same functions.

/// Prefix-scoped key builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generic entity key: `{prefix}{raw}`
    #[must_use]
    pub fn key(&self, raw: &str) -> String {
        format!("{}{raw}", self.prefix)
    }

    /// Job record: `{prefix}job:{job_id}`
    #[must_use]
    pub fn job(&self, job_id: &str) -> String {
        format!("{}job:{job_id}", self.prefix)
    }

    /// Current state hash: `{prefix}job:{job_id}:state`
    #[must_use]
    pub fn job_state(&self, job_id: &str) -> String {
        format!("{}job:{job_id}:state", self.prefix)
    }

    /// State history list: `{prefix}job:{job_id}:history`
    #[must_use]
    pub fn job_history(&self, job_id: &str) -> String {
        format!("{}job:{job_id}:history", self.prefix)
    }

    /// The three keys that share a job's expiration policy.
    #[must_use]
    pub fn job_keys(&self, job_id: &str) -> [String; 3] {
        [
            self.job(job_id),
            self.job_state(job_id),
            self.job_history(job_id),
        ]
    }

    /// Sorted set of known queue names: `{prefix}queues`
    #[must_use]
    pub fn queues(&self) -> String {
        format!("{}queues", self.prefix)
    }

    /// Queue list of job ids: `{prefix}queue:{name}`
    #[must_use]
    pub fn queue(&self, name: &str) -> String {
        format!("{}queue:{name}", self.prefix)
    }

    /// Pub/sub channel announcing new work: `{prefix}queue:{name}:notify`
    #[must_use]
    pub fn queue_channel(&self, name: &str) -> String {
        format!("{}queue:{name}:notify", self.prefix)
    }
}

/// Field name constants shared by the state hash, the job record and history entries.
pub mod fields {
    pub const STATE: &str = "State";
    pub const REASON: &str = "Reason";
    pub const CREATED_AT: &str = "CreatedAt";
}
