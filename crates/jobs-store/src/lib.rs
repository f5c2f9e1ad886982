mod error;
mod storage;
mod transaction;

pub use error::JobStoreError;
pub use storage::{JobStorage, JobStorageOptions};
pub use transaction::{CommitSummary, MissedNotification, WriteTransaction};
