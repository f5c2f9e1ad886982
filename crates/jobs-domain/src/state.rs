use std::collections::BTreeMap;

/// What a job state contributes to storage: its name, why the job entered it,
/// and the state-specific fields persisted alongside.
pub trait JobStateRecord: Send + Sync {
    fn name(&self) -> &str;
    fn reason(&self) -> &str;
    fn serialize_data(&self) -> BTreeMap<String, String>;
}

/// Names of the built-in job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StateName {
    Enqueued,
    Scheduled,
    Processing,
    Succeeded,
    Failed,
    Deleted,
}

impl StateName {
    /// Final states are the ones after which a job's keys are usually expired.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Succeeded | Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enqueued => "Enqueued",
            Self::Scheduled => "Scheduled",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Deleted => "Deleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Enqueued" => Some(Self::Enqueued),
            "Scheduled" => Some(Self::Scheduled),
            "Processing" => Some(Self::Processing),
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            "Deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for StateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job is waiting in `queue`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueuedState {
    pub queue: String,
    pub enqueued_at: u64,
    pub reason: String,
}

impl JobStateRecord for EnqueuedState {
    fn name(&self) -> &str {
        StateName::Enqueued.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Queue".to_string(), self.queue.clone()),
            ("EnqueuedAt".to_string(), self.enqueued_at.to_string()),
        ])
    }
}

/// Job will be enqueued at `enqueue_at` (unix millis).
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledState {
    pub enqueue_at: u64,
    pub scheduled_at: u64,
    pub reason: String,
}

impl JobStateRecord for ScheduledState {
    fn name(&self) -> &str {
        StateName::Scheduled.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("EnqueueAt".to_string(), self.enqueue_at.to_string()),
            ("ScheduledAt".to_string(), self.scheduled_at.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingState {
    pub server_id: String,
    pub worker_id: String,
    pub started_at: u64,
    pub reason: String,
}

impl JobStateRecord for ProcessingState {
    fn name(&self) -> &str {
        StateName::Processing.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("ServerId".to_string(), self.server_id.clone()),
            ("WorkerId".to_string(), self.worker_id.clone()),
            ("StartedAt".to_string(), self.started_at.to_string()),
        ])
    }
}

/// Job finished. `result` is omitted from storage when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SucceededState {
    pub succeeded_at: u64,
    pub latency_ms: u64,
    pub duration_ms: u64,
    pub result: Option<String>,
    pub reason: String,
}

impl JobStateRecord for SucceededState {
    fn name(&self) -> &str {
        StateName::Succeeded.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::from([
            ("SucceededAt".to_string(), self.succeeded_at.to_string()),
            ("Latency".to_string(), self.latency_ms.to_string()),
            ("PerformanceDuration".to_string(), self.duration_ms.to_string()),
        ]);
        if let Some(result) = &self.result {
            data.insert("Result".to_string(), result.clone());
        }
        data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedState {
    pub failed_at: u64,
    pub error_type: String,
    pub error_message: String,
    pub error_details: String,
    pub reason: String,
}

impl JobStateRecord for FailedState {
    fn name(&self) -> &str {
        StateName::Failed.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("FailedAt".to_string(), self.failed_at.to_string()),
            ("ExceptionType".to_string(), self.error_type.clone()),
            ("ExceptionMessage".to_string(), self.error_message.clone()),
            ("ExceptionDetails".to_string(), self.error_details.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedState {
    pub deleted_at: u64,
    pub reason: String,
}

impl JobStateRecord for DeletedState {
    fn name(&self) -> &str {
        StateName::Deleted.as_str()
    }

    fn reason(&self) -> &str {
        &self.reason
    }

    fn serialize_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("DeletedAt".to_string(), self.deleted_at.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StateName; 6] = [
        StateName::Enqueued,
        StateName::Scheduled,
        StateName::Processing,
        StateName::Succeeded,
        StateName::Failed,
        StateName::Deleted,
    ];

    #[test]
    fn final_states() {
        assert!(!StateName::Enqueued.is_final());
        assert!(!StateName::Scheduled.is_final());
        assert!(!StateName::Processing.is_final());
        assert!(!StateName::Failed.is_final());
        assert!(StateName::Succeeded.is_final());
        assert!(StateName::Deleted.is_final());
    }

    #[test]
    fn parse_inverts_as_str() {
        for name in ALL {
            assert_eq!(StateName::parse(name.as_str()), Some(name));
        }
        assert_eq!(StateName::parse("enqueued"), None);
        assert_eq!(StateName::parse("Awaiting"), None);
    }

    #[test]
    fn enqueued_data() {
        let state = EnqueuedState {
            queue: "default".into(),
            enqueued_at: 1_707_934_567_000,
            reason: "triggered by scheduler".into(),
        };
        assert_eq!(state.name(), "Enqueued");
        assert_eq!(state.reason(), "triggered by scheduler");
        let data = state.serialize_data();
        assert_eq!(data["Queue"], "default");
        assert_eq!(data["EnqueuedAt"], "1707934567000");
    }

    #[test]
    fn succeeded_omits_missing_result() {
        let mut state = SucceededState {
            succeeded_at: 10,
            latency_ms: 2,
            duration_ms: 3,
            result: None,
            reason: String::new(),
        };
        assert!(!state.serialize_data().contains_key("Result"));

        state.result = Some("\"ok\"".into());
        assert_eq!(state.serialize_data()["Result"], "\"ok\"");
    }

    #[test]
    fn failed_data() {
        let state = FailedState {
            failed_at: 99,
            error_type: "io".into(),
            error_message: "connection reset".into(),
            error_details: "at fetch()".into(),
            reason: "worker crashed".into(),
        };
        let data = state.serialize_data();
        assert_eq!(data.len(), 4);
        assert_eq!(data["ExceptionMessage"], "connection reset");
    }

    #[test]
    fn state_name_serde() {
        let json = serde_json::to_string(&StateName::Processing).unwrap();
        assert_eq!(json, "\"Processing\"");
        let back: StateName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StateName::Processing);
    }
}
