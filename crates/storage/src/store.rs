use agent_coord_common::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Primitives the coordination layer needs from the shared store.
///
/// Object-safe so managers can hold an `Arc<dyn KvStore>` and tests can
/// inject [`crate::MemoryStore`] in place of Redis.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a key with expiration (seconds).
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Set a key with expiration only if it does not already exist.
    /// Returns whether the write happened. This is the atomic acquisition
    /// primitive backing file locks.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All keys matching a `*` glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Batched get; result order matches `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Add or rescore a member of a sorted set.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members of a sorted set with scores in `[min, max]`, ascending.
    /// Infinite bounds select everything.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}

/// JSON convenience layer over any [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json_ex<T>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set_ex(key, &raw, ttl_secs).await
    }

    async fn set_json_nx_ex<T>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<bool>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set_nx_ex(key, &raw, ttl_secs).await
    }

    /// Batched `get_json`; entries that fail to parse are dropped rather
    /// than failing the whole batch (a record written by a newer version
    /// should not break every reader).
    async fn mget_json<T>(&self, keys: &[String]) -> Result<Vec<Option<T>>>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.mget(keys).await?;
        Ok(raw
            .into_iter()
            .map(|entry| entry.and_then(|s| serde_json::from_str(&s).ok()))
            .collect())
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStoreExt for S {}
