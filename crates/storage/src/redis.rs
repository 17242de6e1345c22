use std::sync::Arc;
use std::time::Duration;

use agent_coord_common::config::HEALTH_CHECK_INTERVAL_SECS;
use agent_coord_common::error::{CoordError, Result};
use agent_coord_common::CoordinationConfig;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::store::KvStore;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF_MS: u64 = 500;

/// Managed connection to the shared Redis store.
///
/// Holds at most one live multiplexed connection; a failed ping or a
/// connection-level command error empties the slot so the next caller
/// triggers a fresh connect (bounded timeout, capped retries with
/// incremental backoff). Callers that cannot obtain a connection receive
/// [`CoordError::StoreUnavailable`]; no operation proceeds without the store.
pub struct RedisStore {
    client: redis::Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    connect_timeout: Duration,
}

impl RedisStore {
    pub fn new(redis_url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoordError::config(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
            connect_timeout,
        })
    }

    pub fn from_config(config: &CoordinationConfig) -> Result<Self> {
        Self::new(
            &config.redis_url,
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    /// Return the live connection, connecting if the slot is empty.
    /// The slot lock is held across the connect so concurrent callers
    /// await one connection attempt instead of racing their own.
    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let mut last_err = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            match tokio::time::timeout(
                self.connect_timeout,
                self.client.get_multiplexed_async_connection(),
            )
            .await
            {
                Ok(Ok(conn)) => {
                    tracing::info!("connected to store (attempt {attempt})");
                    *slot = Some(conn.clone());
                    return Ok(conn);
                }
                Ok(Err(e)) => last_err = e.to_string(),
                Err(_) => {
                    last_err = format!("connect timed out after {:?}", self.connect_timeout)
                }
            }
            if attempt < CONNECT_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(CONNECT_BACKOFF_MS * attempt as u64))
                    .await;
            }
        }

        Err(CoordError::StoreUnavailable(last_err))
    }

    async fn drop_connection(&self) {
        self.connection.lock().await.take();
    }

    async fn finish<T>(&self, result: RedisResult<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.classify(e).await),
        }
    }

    async fn classify(&self, err: RedisError) -> CoordError {
        if err.is_connection_dropped() || err.is_io_error() || err.is_timeout() {
            self.drop_connection().await;
            CoordError::StoreUnavailable(err.to_string())
        } else {
            CoordError::Store(err.to_string())
        }
    }

    /// Periodic liveness ping, independent of request traffic. On failure
    /// the connection is discarded so the next caller reconnects; no
    /// business-level reconciliation happens here.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick fires immediately; skip it so startup is quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = store.ping().await {
                    tracing::warn!("store health check failed: {e}");
                    store.drop_connection().await;
                }
            }
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let res: RedisResult<Option<String>> = conn.get(key).await;
        self.finish(res).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let res: RedisResult<()> = conn.set_ex(key, value, ttl_secs).await;
        self.finish(res).await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.connection().await?;
        let res: RedisResult<Option<String>> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await;
        Ok(self.finish(res).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let res: RedisResult<usize> = conn.del(key).await;
        Ok(self.finish(res).await? > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let res: RedisResult<Vec<String>> = conn.keys(pattern).await;
        self.finish(res).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        // MGET with a single key still replies with an array; GET avoids the
        // redis crate collapsing a one-element arg list.
        if keys.len() == 1 {
            let res: RedisResult<Option<String>> = conn.get(&keys[0]).await;
            return Ok(vec![self.finish(res).await?]);
        }
        let res: RedisResult<Vec<Option<String>>> = conn.mget(keys).await;
        self.finish(res).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.connection().await?;
        let res: RedisResult<()> = conn.zadd(key, member, score).await;
        self.finish(res).await
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let res: RedisResult<Vec<String>> = conn.zrangebyscore(key, min, max).await;
        self.finish(res).await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let res: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        self.finish(res).await?;
        Ok(())
    }
}
