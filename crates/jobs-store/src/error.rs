use gbe_jobs_domain::DomainError;
use gbe_state_store::StateStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobStoreError {
    /// Rejected before anything was queued; a transaction stays usable.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: &'static str,
    },

    #[error("encoding: {0}")]
    Encode(#[from] DomainError),

    #[error("state store: {0}")]
    Store(#[from] StateStoreError),
}

impl JobStoreError {
    /// Name of the offending parameter, for `InvalidArgument`.
    pub fn argument(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { argument, .. } => Some(*argument),
            _ => None,
        }
    }
}

/// Reject an empty required identifier.
pub(crate) fn require(value: &str, argument: &'static str) -> Result<(), JobStoreError> {
    if value.is_empty() {
        return Err(JobStoreError::InvalidArgument {
            argument,
            reason: "must not be empty",
        });
    }
    Ok(())
}
