mod keyspace;
mod store;

pub use store::{MemoryStateStore, PUBLISHED_LOG_CAPACITY, Published};
