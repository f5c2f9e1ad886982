/// Errors for job domain encoding.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("history entry is not a string map: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("history entry missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: String },
}
