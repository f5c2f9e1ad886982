use gbe_state_store::StateStoreError;

#[allow(clippy::needless_pass_by_value)] // signature required for use with .map_err()
pub(crate) fn map_redis_err(e: redis::RedisError) -> StateStoreError {
    use redis::ErrorKind;
    match e.kind() {
        ErrorKind::IoError | ErrorKind::AuthenticationFailed => {
            StateStoreError::Connection(e.to_string())
        }
        ErrorKind::ExecAbortError | ErrorKind::ResponseError => {
            StateStoreError::Command(e.to_string())
        }
        ErrorKind::TypeError => StateStoreError::Other(format!("redis type error: {e}")),
        // Server replies such as WRONGTYPE carry a code.
        _ if e.code().is_some() => StateStoreError::Command(e.to_string()),
        _ => StateStoreError::Other(e.to_string()),
    }
}
