use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gbe_state_store::{AddMode, StateStoreError, WriteBatch, WriteOp};

use crate::error::map_redis_err;

/// Batch executed as one `MULTI`/`EXEC` pipeline on a cloned connection.
pub(crate) struct RedisBatch {
    conn: redis::aio::ConnectionManager,
    closed: Arc<AtomicBool>,
}

impl RedisBatch {
    pub(crate) fn new(conn: redis::aio::ConnectionManager, closed: Arc<AtomicBool>) -> Self {
        Self { conn, closed }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Queue one op on the pipeline.
pub(crate) fn append(pipe: &mut redis::Pipeline, op: &WriteOp) {
    match op {
        WriteOp::Expire { key, ttl } => pipe.cmd("PEXPIRE").arg(key).arg(ttl_millis(*ttl)),
        WriteOp::Persist { key } => pipe.cmd("PERSIST").arg(key),
        WriteOp::Delete { key } => pipe.cmd("DEL").arg(key),
        WriteOp::HashSet { key, field, value } => pipe.cmd("HSET").arg(key).arg(field).arg(value),
        WriteOp::HashSetMany { key, fields } => pipe.cmd("HSET").arg(key).arg(fields),
        WriteOp::SortedSetAdd {
            key,
            member,
            score,
            mode,
        } => {
            let cmd = pipe.cmd("ZADD").arg(key);
            if *mode == AddMode::IfAbsent {
                cmd.arg("NX");
            }
            cmd.arg(*score).arg(member)
        }
        WriteOp::SortedSetRemove { key, member } => pipe.cmd("ZREM").arg(key).arg(member),
        WriteOp::ListPushLeft { key, value } => pipe.cmd("LPUSH").arg(key).arg(value),
        WriteOp::ListPushRight { key, value } => pipe.cmd("RPUSH").arg(key).arg(value),
        WriteOp::ListRemove { key, value } => pipe.cmd("LREM").arg(key).arg(0).arg(value),
        WriteOp::ListTrim { key, start, stop } => {
            pipe.cmd("LTRIM").arg(key).arg(*start).arg(*stop)
        }
        WriteOp::Increment { key, delta } => pipe.cmd("INCRBY").arg(key).arg(*delta),
    };
}

#[async_trait]
impl WriteBatch for RedisBatch {
    async fn execute(&mut self, ops: Vec<WriteOp>) -> Result<(), StateStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateStoreError::Other("store is closed".to_string()));
        }
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            append(&mut pipe, op);
        }

        // A command failing inside EXEC surfaces as the pipeline's error; the
        // commands that succeeded before it stay applied.
        pipe.query_async::<()>(&mut self.conn)
            .await
            .map_err(map_redis_err)?;

        tracing::debug!(ops = ops.len(), "redis batch executed");
        Ok(())
    }
}
