mod batch;
mod error;
mod store;

pub use store::RedisStateStore;
