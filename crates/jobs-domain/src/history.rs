use std::collections::BTreeMap;

use crate::error::DomainError;
use crate::keys::fields;
use crate::state::JobStateRecord;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
#[allow(clippy::cast_possible_truncation)] // millis since epoch fits in u64 until year 584556
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Fields written to a job's current-state hash: the state data plus `Reason`.
///
/// The state name itself lives on the job record, not in this hash.
pub fn current_state_fields(state: &dyn JobStateRecord) -> BTreeMap<String, String> {
    let mut out = state.serialize_data();
    out.insert(fields::REASON.to_string(), state.reason().to_string());
    out
}

/// One entry of a job's state history list.
///
/// Stored as a flat JSON object of string fields: the state's data with
/// `State`, `Reason` and `CreatedAt` added. Metadata overrides any state data
/// field with the same name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HistoryEntry {
    fields: BTreeMap<String, String>,
}

impl HistoryEntry {
    /// Build an entry for `state`, stamped with `created_at` (unix millis).
    pub fn from_state(state: &dyn JobStateRecord, created_at: u64) -> Self {
        let mut out = state.serialize_data();
        out.insert(fields::STATE.to_string(), state.name().to_string());
        out.insert(fields::REASON.to_string(), state.reason().to_string());
        out.insert(fields::CREATED_AT.to_string(), created_at.to_string());
        Self { fields: out }
    }

    /// Serialize for storage in the history list.
    ///
    /// # Errors
    /// Returns `DomainError::Decode` if serialization fails.
    pub fn encode(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore an entry read back from the history list.
    ///
    /// # Errors
    /// Fails if the text is not a JSON string map or lacks the `State` or
    /// `CreatedAt` metadata.
    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        let entry: Self = serde_json::from_str(raw)?;
        if !entry.fields.contains_key(fields::STATE) {
            return Err(DomainError::MissingField(fields::STATE));
        }
        if !entry.fields.contains_key(fields::CREATED_AT) {
            return Err(DomainError::MissingField(fields::CREATED_AT));
        }
        Ok(entry)
    }

    pub fn state(&self) -> &str {
        self.get(fields::STATE).unwrap_or_default()
    }

    pub fn reason(&self) -> &str {
        self.get(fields::REASON).unwrap_or_default()
    }

    /// When the transition was recorded (unix millis).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidField` if the stored value is not an integer.
    pub fn created_at(&self) -> Result<u64, DomainError> {
        let raw = self.get(fields::CREATED_AT).unwrap_or_default();
        raw.parse().map_err(|_| DomainError::InvalidField {
            field: fields::CREATED_AT,
            value: raw.to_string(),
        })
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}
