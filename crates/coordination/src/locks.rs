//! Exclusive, TTL-bounded locks on normalized file paths.

use std::sync::Arc;

use agent_coord_common::error::{CoordError, Result};
use agent_coord_common::keys::{normalize_file_path, KeySpace};
use agent_coord_common::types::FileLock;
use agent_coord_common::CoordinationConfig;
use agent_coord_storage::{KvStore, KvStoreExt, LockCache};
use chrono::Utc;
use serde::Serialize;

/// Result of a single unlock. Unlocking a free file is a success, not an
/// error, so retries after a crash stay idempotent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockOutcome {
    pub file: String,
    pub was_locked: bool,
}

/// Per-file failure inside a batch operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLockOutcome {
    pub locked: Vec<FileLock>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUnlockOutcome {
    pub unlocked: Vec<UnlockOutcome>,
    pub failed: Vec<BatchFailure>,
}

/// Acquire/release of exclusive file locks, with the read-through cache in
/// front of the hot check path. Per file the state machine is
/// `unlocked -> locked(agent) -> unlocked`, the second transition by
/// explicit unlock or by store-driven TTL expiry.
pub struct FileLockManager {
    store: Arc<dyn KvStore>,
    cache: Arc<LockCache>,
    keys: KeySpace,
    default_ttl_secs: u64,
}

impl FileLockManager {
    pub fn new(store: Arc<dyn KvStore>, cache: Arc<LockCache>, config: &CoordinationConfig) -> Self {
        Self {
            store,
            cache,
            keys: KeySpace::new(config.key_prefix.clone()),
            default_ttl_secs: config.coordination_ttl_secs,
        }
    }

    /// Acquire an exclusive lock. A write decision depends on current lock
    /// state, so this path always bypasses the cache. Acquisition itself is
    /// an atomic set-if-not-exists on the lock key; the read before it only
    /// exists to refresh a lock we already hold and to name the holder in
    /// the failure message.
    pub async fn lock_file(
        &self,
        file: &str,
        agent_id: &str,
        reason: &str,
        ttl_secs: Option<u64>,
    ) -> Result<FileLock> {
        let file = normalize_file_path(file);
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs);
        let key = self.keys.lock(&file);
        let now = Utc::now();
        let lock = FileLock {
            file: file.clone(),
            agent_id: agent_id.to_string(),
            reason: reason.to_string(),
            locked_at: now,
            expires_at: now + chrono::Duration::seconds(ttl as i64),
        };

        if let Some(current) = self.store.get_json::<FileLock>(&key).await? {
            if current.agent_id != agent_id {
                return Err(CoordError::FileLocked {
                    file,
                    agent_id: current.agent_id,
                });
            }
            // re-lock by the holder refreshes the lease
            self.store.set_json_ex(&key, &lock, ttl).await?;
            self.cache.store(&file, Some(lock.clone()));
            tracing::debug!(file = %file, agent = %agent_id, "lock refreshed");
            return Ok(lock);
        }

        if !self.store.set_json_nx_ex(&key, &lock, ttl).await? {
            // a racer acquired it between the read and the write
            let holder = self
                .store
                .get_json::<FileLock>(&key)
                .await?
                .map(|l| l.agent_id)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(CoordError::FileLocked {
                file,
                agent_id: holder,
            });
        }

        self.cache.store(&file, Some(lock.clone()));
        tracing::info!(file = %file, agent = %agent_id, ttl, "file locked");
        Ok(lock)
    }

    /// Release a lock. Only the holder may release; a free file is a
    /// no-op success.
    pub async fn unlock_file(&self, file: &str, agent_id: &str) -> Result<UnlockOutcome> {
        let file = normalize_file_path(file);
        let key = self.keys.lock(&file);

        match self.store.get_json::<FileLock>(&key).await? {
            None => {
                self.cache.store(&file, None);
                Ok(UnlockOutcome {
                    file,
                    was_locked: false,
                })
            }
            Some(current) if current.agent_id != agent_id => Err(CoordError::not_owner(
                agent_id,
                format!("lock on {} (held by {})", file, current.agent_id),
            )),
            Some(_) => {
                self.store.delete(&key).await?;
                self.cache.store(&file, None);
                tracing::info!(file = %file, agent = %agent_id, "file unlocked");
                Ok(UnlockOutcome {
                    file,
                    was_locked: true,
                })
            }
        }
    }

    /// Lock several files in one call. Failures do not roll back earlier
    /// acquisitions; the caller sees exactly which files it now holds.
    pub async fn lock_files(
        &self,
        files: &[String],
        agent_id: &str,
        reason: &str,
        ttl_secs: Option<u64>,
    ) -> Result<BatchLockOutcome> {
        let mut locked = Vec::new();
        let mut failed = Vec::new();
        for file in files {
            match self.lock_file(file, agent_id, reason, ttl_secs).await {
                Ok(lock) => locked.push(lock),
                Err(e @ CoordError::FileLocked { .. }) => failed.push(BatchFailure {
                    file: normalize_file_path(file),
                    error: e.to_string(),
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(BatchLockOutcome { locked, failed })
    }

    /// Release several locks in one call.
    pub async fn unlock_files(&self, files: &[String], agent_id: &str) -> Result<BatchUnlockOutcome> {
        let mut unlocked = Vec::new();
        let mut failed = Vec::new();
        for file in files {
            match self.unlock_file(file, agent_id).await {
                Ok(outcome) => unlocked.push(outcome),
                Err(e @ CoordError::NotOwner { .. }) => failed.push(BatchFailure {
                    file: normalize_file_path(file),
                    error: e.to_string(),
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(BatchUnlockOutcome { unlocked, failed })
    }

    /// Current lock state for one path, cache-first.
    pub async fn check_file_lock(&self, file: &str) -> Result<Option<FileLock>> {
        let file = normalize_file_path(file);
        if let Some(cached) = self.cache.get(&file) {
            return Ok(cached);
        }
        let lock = self
            .store
            .get_json::<FileLock>(&self.keys.lock(&file))
            .await?;
        self.cache.store(&file, lock.clone());
        Ok(lock)
    }

    /// Batch lock-state lookup backing conflict detection: cache hits are
    /// answered locally, the misses go to the store in one batched read and
    /// back-fill the cache (including explicit no-lock markers).
    pub async fn check_file_locks(&self, files: &[String]) -> Result<Vec<Option<FileLock>>> {
        let normalized: Vec<String> = files.iter().map(|f| normalize_file_path(f)).collect();
        let mut results = self.cache.get_many(&normalized);

        let misses: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();

        if !misses.is_empty() {
            let miss_keys: Vec<String> = misses
                .iter()
                .map(|&i| self.keys.lock(&normalized[i]))
                .collect();
            let fetched: Vec<Option<FileLock>> = self.store.mget_json(&miss_keys).await?;
            for (&i, lock) in misses.iter().zip(fetched) {
                self.cache.store(&normalized[i], lock.clone());
                results[i] = Some(lock);
            }
        }

        Ok(results.into_iter().map(|r| r.flatten()).collect())
    }

    /// Every live lock, optionally filtered by holder. Full key scan,
    /// acceptable while the lock set stays in the hundreds.
    pub async fn list_locked_files(&self, agent_id: Option<&str>) -> Result<Vec<FileLock>> {
        let keys = self.store.keys(&self.keys.lock_pattern()).await?;
        let records: Vec<Option<FileLock>> = self.store.mget_json(&keys).await?;
        let mut locks: Vec<FileLock> = records.into_iter().flatten().collect();
        if let Some(agent) = agent_id {
            locks.retain(|l| l.agent_id == agent);
        }
        locks.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(locks)
    }
}
