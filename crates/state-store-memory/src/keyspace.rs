use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use gbe_state_store::{AddMode, StateStoreError, WriteOp};

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// All keys of one store. Expired keys are dropped lazily on access.
#[derive(Debug, Clone, Default)]
pub(crate) struct Keyspace {
    entries: HashMap<String, Entry>,
}

fn wrong_type(key: &str) -> StateStoreError {
    StateStoreError::WrongType {
        key: key.to_string(),
    }
}

/// Resolve a Redis-style inclusive range against a sequence of `len` items.
/// Returns `None` when the range selects nothing.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(crate) fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl Keyspace {
    fn purge_expired(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    pub fn get(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        self.purge_expired(key, now);
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        self.purge_expired(key, now);
        self.entries.get_mut(key)
    }

    fn get_or_insert(&mut self, key: &str, now: Instant, empty: fn() -> Value) -> &mut Entry {
        self.purge_expired(key, now);
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(empty()))
    }

    fn hash_mut(
        &mut self,
        key: &str,
        now: Instant,
    ) -> Result<&mut HashMap<String, String>, StateStoreError> {
        match &mut self.get_or_insert(key, now, || Value::Hash(HashMap::new())).value {
            Value::Hash(h) => Ok(h),
            _ => Err(wrong_type(key)),
        }
    }

    fn list_mut(&mut self, key: &str, now: Instant) -> Result<&mut VecDeque<String>, StateStoreError> {
        match &mut self.get_or_insert(key, now, || Value::List(VecDeque::new())).value {
            Value::List(l) => Ok(l),
            _ => Err(wrong_type(key)),
        }
    }

    /// Apply one op with the same observable effect Redis has.
    pub fn apply(&mut self, op: &WriteOp, now: Instant) -> Result<(), StateStoreError> {
        match op {
            WriteOp::Expire { key, ttl } => {
                if ttl.is_zero() {
                    self.entries.remove(key);
                } else if let Some(entry) = self.get_mut(key, now) {
                    let expires_at = now.checked_add(*ttl).ok_or_else(|| {
                        StateStoreError::Command(format!(
                            "invalid expire time in 'pexpire' command for {key}"
                        ))
                    })?;
                    entry.expires_at = Some(expires_at);
                }
            }
            WriteOp::Persist { key } => {
                if let Some(entry) = self.get_mut(key, now) {
                    entry.expires_at = None;
                }
            }
            WriteOp::Delete { key } => {
                self.entries.remove(key);
            }
            WriteOp::HashSet { key, field, value } => {
                self.hash_mut(key, now)?
                    .insert(field.clone(), value.clone());
            }
            WriteOp::HashSetMany { key, fields } => {
                if fields.is_empty() {
                    return Err(StateStoreError::Command(
                        "wrong number of arguments for 'hset' command".to_string(),
                    ));
                }
                let hash = self.hash_mut(key, now)?;
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
            }
            WriteOp::SortedSetAdd {
                key,
                member,
                score,
                mode,
            } => {
                let entry = self.get_or_insert(key, now, || Value::SortedSet(HashMap::new()));
                let Value::SortedSet(set) = &mut entry.value else {
                    return Err(wrong_type(key));
                };
                match mode {
                    AddMode::Upsert => {
                        set.insert(member.clone(), *score);
                    }
                    AddMode::IfAbsent => {
                        set.entry(member.clone()).or_insert(*score);
                    }
                }
            }
            WriteOp::SortedSetRemove { key, member } => {
                let Some(entry) = self.get_mut(key, now) else {
                    return Ok(());
                };
                let Value::SortedSet(set) = &mut entry.value else {
                    return Err(wrong_type(key));
                };
                set.remove(member);
                if set.is_empty() {
                    self.entries.remove(key);
                }
            }
            WriteOp::ListPushLeft { key, value } => {
                self.list_mut(key, now)?.push_front(value.clone());
            }
            WriteOp::ListPushRight { key, value } => {
                self.list_mut(key, now)?.push_back(value.clone());
            }
            WriteOp::ListRemove { key, value } => {
                let Some(entry) = self.get_mut(key, now) else {
                    return Ok(());
                };
                let Value::List(list) = &mut entry.value else {
                    return Err(wrong_type(key));
                };
                list.retain(|v| v != value);
                if list.is_empty() {
                    self.entries.remove(key);
                }
            }
            WriteOp::ListTrim { key, start, stop } => {
                let Some(entry) = self.get_mut(key, now) else {
                    return Ok(());
                };
                let Value::List(list) = &mut entry.value else {
                    return Err(wrong_type(key));
                };
                match resolve_range(list.len(), *start, *stop) {
                    Some((from, to)) => {
                        list.truncate(to + 1);
                        list.drain(..from);
                    }
                    None => {
                        self.entries.remove(key);
                    }
                }
            }
            WriteOp::Increment { key, delta } => {
                let entry = self.get_or_insert(key, now, || Value::Str("0".to_string()));
                let Value::Str(raw) = &mut entry.value else {
                    return Err(wrong_type(key));
                };
                let current: i64 = raw.parse().map_err(|_| {
                    StateStoreError::Command("value is not an integer or out of range".to_string())
                })?;
                let next = current.checked_add(*delta).ok_or_else(|| {
                    StateStoreError::Command("increment or decrement would overflow".to_string())
                })?;
                *raw = next.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn push_right(ks: &mut Keyspace, key: &str, values: &[&str], now: Instant) {
        for v in values {
            ks.apply(
                &WriteOp::ListPushRight {
                    key: key.into(),
                    value: (*v).into(),
                },
                now,
            )
            .unwrap();
        }
    }

    fn list(ks: &mut Keyspace, key: &str, now: Instant) -> Vec<String> {
        match ks.get(key, now).map(|e| &e.value) {
            Some(Value::List(l)) => l.iter().cloned().collect(),
            None => vec![],
            other => panic!("not a list: {other:?}"),
        }
    }

    #[test]
    fn resolve_range_matches_redis() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 1, 2), Some((1, 2)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 0, 100), Some((0, 4)));
        assert_eq!(resolve_range(5, -100, 1), Some((0, 1)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(5, 5, 10), None);
        assert_eq!(resolve_range(0, 0, -1), None);
    }

    #[test]
    fn trim_keeps_inclusive_range() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        push_right(&mut ks, "l", &["a", "b", "c", "d", "e"], now);

        ks.apply(
            &WriteOp::ListTrim {
                key: "l".into(),
                start: 1,
                stop: -2,
            },
            now,
        )
        .unwrap();
        assert_eq!(list(&mut ks, "l", now), ["b", "c", "d"]);
    }

    #[test]
    fn trim_to_empty_range_deletes_key() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        push_right(&mut ks, "l", &["a"], now);
        ks.apply(
            &WriteOp::ListTrim {
                key: "l".into(),
                start: 2,
                stop: 3,
            },
            now,
        )
        .unwrap();
        assert!(ks.get("l", now).is_none());
    }

    #[test]
    fn list_remove_drops_all_occurrences() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        push_right(&mut ks, "l", &["x", "y", "x"], now);
        ks.apply(
            &WriteOp::ListRemove {
                key: "l".into(),
                value: "x".into(),
            },
            now,
        )
        .unwrap();
        assert_eq!(list(&mut ks, "l", now), ["y"]);
    }

    #[test]
    fn expired_keys_disappear() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        push_right(&mut ks, "l", &["a"], now);
        ks.apply(
            &WriteOp::Expire {
                key: "l".into(),
                ttl: Duration::from_secs(5),
            },
            now,
        )
        .unwrap();

        assert!(ks.get("l", now + Duration::from_secs(4)).is_some());
        assert!(ks.get("l", now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn expire_overflow_is_rejected() {
        let mut ks = Keyspace::default();
        let now = Instant::now();
        push_right(&mut ks, "l", &["v"], now);

        let err = ks
            .apply(
                &WriteOp::Expire {
                    key: "l".into(),
                    ttl: Duration::MAX,
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, StateStoreError::Command(_)));
        assert!(ks.get("l", now).unwrap().expires_at.is_none());
    }

    #[test]
    fn expire_on_missing_key_is_noop() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        ks.apply(
            &WriteOp::Expire {
                key: "ghost".into(),
                ttl: Duration::from_secs(5),
            },
            now,
        )
        .unwrap();
        assert!(ks.get("ghost", now).is_none());
    }

    #[test]
    fn increment_rejects_non_integer() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        ks.entries
            .insert("c".into(), Entry::new(Value::Str("abc".into())));
        let err = ks
            .apply(
                &WriteOp::Increment {
                    key: "c".into(),
                    delta: 1,
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, StateStoreError::Command(_)));
    }

    #[test]
    fn wrong_type_is_reported() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        push_right(&mut ks, "k", &["a"], now);
        let err = ks
            .apply(
                &WriteOp::HashSet {
                    key: "k".into(),
                    field: "f".into(),
                    value: "v".into(),
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, StateStoreError::WrongType { key } if key == "k"));
    }

    #[test]
    fn add_if_absent_keeps_first_score() {
        let now = Instant::now();
        let mut ks = Keyspace::default();
        for score in [1.0, 2.0] {
            ks.apply(
                &WriteOp::SortedSetAdd {
                    key: "z".into(),
                    member: "m".into(),
                    score,
                    mode: AddMode::IfAbsent,
                },
                now,
            )
            .unwrap();
        }
        let Some(Value::SortedSet(set)) = ks.get("z", now).map(|e| &e.value) else {
            panic!("expected sorted set");
        };
        assert_eq!(set["m"], 1.0);
    }
}
