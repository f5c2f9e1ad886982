use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("batch rejected: {0}")]
    Command(String),

    #[error("wrong value type at key {key}")]
    WrongType { key: String },

    #[error("{0}")]
    Other(String),
}
