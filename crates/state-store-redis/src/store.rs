use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gbe_state_store::{Notifier, StateStoreConfig, StateStoreError, WriteBatch};

use crate::batch::RedisBatch;
use crate::error::map_redis_err;

/// Redis-backed store. Also the notifier: `PUBLISH` goes over the same
/// connection manager.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: redis::aio::ConnectionManager,
    closed: Arc<AtomicBool>,
}

impl RedisStateStore {
    pub async fn connect(config: StateStoreConfig) -> Result<Self, StateStoreError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StateStoreError::Connection(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| StateStoreError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn check_closed(&self) -> Result<(), StateStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateStoreError::Other("store is closed".to_string()));
        }
        Ok(())
    }

    async fn query<T: redis::FromRedisValue>(
        &self,
        cmd: &redis::Cmd,
    ) -> Result<T, StateStoreError> {
        self.check_closed()?;
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn).await.map_err(map_redis_err)
    }
}

#[async_trait]
impl gbe_state_store::StateStore for RedisStateStore {
    fn batch(&self) -> Box<dyn WriteBatch> {
        Box::new(RedisBatch::new(self.conn.clone(), self.closed.clone()))
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StateStoreError> {
        self.query(redis::cmd("HGETALL").arg(key)).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError> {
        self.query(redis::cmd("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StateStoreError> {
        self.query(redis::cmd("LLEN").arg(key)).await
    }

    async fn sorted_set_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StateStoreError> {
        self.query(redis::cmd("ZSCORE").arg(key).arg(member)).await
    }

    async fn sorted_set_rank(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<u64>, StateStoreError> {
        self.query(redis::cmd("ZRANK").arg(key).arg(member)).await
    }

    async fn sorted_set_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StateStoreError> {
        self.query(redis::cmd("ZRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StateStoreError> {
        let count: u64 = self.query(redis::cmd("EXISTS").arg(key)).await?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StateStoreError> {
        // -2: missing key, -1: no expiry
        let millis: i64 = self.query(redis::cmd("PTTL").arg(key)).await?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn ping(&self) -> Result<bool, StateStoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(pong == "PONG")
    }

    async fn close(&self) -> Result<(), StateStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RedisStateStore {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StateStoreError> {
        let receivers: u64 = self
            .query(redis::cmd("PUBLISH").arg(channel).arg(message))
            .await?;
        tracing::trace!(channel, receivers, "published");
        Ok(())
    }
}
