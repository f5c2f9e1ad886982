mod error;
mod op;
mod store;

pub use error::StateStoreError;
pub use op::{AddMode, WriteOp};
pub use store::{Notifier, StateStore, StateStoreConfig, WriteBatch};
