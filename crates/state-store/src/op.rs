use std::time::Duration;

/// How a sorted-set add treats a member that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Insert or overwrite the score.
    Upsert,
    /// Only insert new members; existing scores are kept.
    IfAbsent,
}

/// One deferred store command. Keys are fully qualified (prefix applied).
///
/// Backends execute a `Vec<WriteOp>` as a single atomic batch, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set a key's time to live. No-op on a missing key.
    Expire { key: String, ttl: Duration },
    /// Remove a key's time to live. No-op on a missing key.
    Persist { key: String },
    /// Delete a key of any type.
    Delete { key: String },
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    HashSetMany {
        key: String,
        fields: Vec<(String, String)>,
    },
    SortedSetAdd {
        key: String,
        member: String,
        score: f64,
        mode: AddMode,
    },
    SortedSetRemove { key: String, member: String },
    /// Prepend; the value becomes index 0.
    ListPushLeft { key: String, value: String },
    /// Append; the value becomes the last index.
    ListPushRight { key: String, value: String },
    /// Remove every occurrence of `value`.
    ListRemove { key: String, value: String },
    /// Keep only `start..=stop`; negative indices count from the end.
    ListTrim { key: String, start: i64, stop: i64 },
    /// Add `delta` to an integer string, creating it at 0 when missing.
    Increment { key: String, delta: i64 },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            Self::Expire { key, .. }
            | Self::Persist { key }
            | Self::Delete { key }
            | Self::HashSet { key, .. }
            | Self::HashSetMany { key, .. }
            | Self::SortedSetAdd { key, .. }
            | Self::SortedSetRemove { key, .. }
            | Self::ListPushLeft { key, .. }
            | Self::ListPushRight { key, .. }
            | Self::ListRemove { key, .. }
            | Self::ListTrim { key, .. }
            | Self::Increment { key, .. } => key,
        }
    }

    /// Redis command name, used for logging.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Expire { .. } => "PEXPIRE",
            Self::Persist { .. } => "PERSIST",
            Self::Delete { .. } => "DEL",
            Self::HashSet { .. } | Self::HashSetMany { .. } => "HSET",
            Self::SortedSetAdd { .. } => "ZADD",
            Self::SortedSetRemove { .. } => "ZREM",
            Self::ListPushLeft { .. } => "LPUSH",
            Self::ListPushRight { .. } => "RPUSH",
            Self::ListRemove { .. } => "LREM",
            Self::ListTrim { .. } => "LTRIM",
            Self::Increment { .. } => "INCRBY",
        }
    }
}
