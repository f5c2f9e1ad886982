pub mod error;
pub mod history;
pub mod keys;
pub mod state;

pub use error::DomainError;
pub use history::{HistoryEntry, current_state_fields, unix_millis};
pub use keys::KeySpace;
pub use state::{
    DeletedState, EnqueuedState, FailedState, JobStateRecord, ProcessingState, ScheduledState,
    StateName, SucceededState,
};
