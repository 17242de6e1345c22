//! Bounded, short-TTL read-through cache for lock lookups.
//!
//! Conflict checks are read-heavy; this cache absorbs them so the store
//! sees one read per path per freshness window. Both a live lock and the
//! absence of one are cached, so repeated checks on free files also stay
//! local. Lock writes made by this process update the entry immediately;
//! staleness is only possible for writes made by other processes, bounded
//! by the entry TTL. Callers that need a guaranteed-fresh answer bypass
//! the cache and read the store directly.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use agent_coord_common::types::FileLock;
use chrono::Utc;
use lru::LruCache;

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Slot {
    lock: Option<FileLock>,
    fetched_at: Instant,
}

/// Maps normalized file path to "lock or known absence of a lock".
pub struct LockCache {
    entries: Mutex<LruCache<String, Slot>>,
    ttl: Duration,
}

impl LockCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Fresh cached answer for a path, if any. The outer `Option` is
    /// hit/miss; the inner one is lock/no-lock. A cached lock whose own
    /// lease has run out is a miss, not a hit: the store key is gone, and
    /// reporting the stale grant would hold the file hostage for the
    /// freshness window.
    pub fn get(&self, file: &str) -> Option<Option<FileLock>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(file) {
            Some(slot) if slot.fetched_at.elapsed() < self.ttl => {
                if slot.lock.as_ref().is_some_and(|l| l.expires_at <= Utc::now()) {
                    entries.pop(file);
                    return None;
                }
                Some(slot.lock.clone())
            }
            Some(_) => {
                entries.pop(file);
                None
            }
            None => None,
        }
    }

    /// Batch lookup; result order matches `files`.
    pub fn get_many(&self, files: &[String]) -> Vec<Option<Option<FileLock>>> {
        files.iter().map(|file| self.get(file)).collect()
    }

    /// Record the current lock state for a path (either a lock or its
    /// explicit absence).
    pub fn store(&self, file: &str, lock: Option<FileLock>) {
        let mut entries = self.entries.lock().unwrap();
        entries.put(
            file.to_string(),
            Slot {
                lock,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, file: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.pop(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lock_for(agent: &str, file: &str) -> FileLock {
        FileLock {
            file: file.to_string(),
            agent_id: agent.to_string(),
            reason: String::new(),
            locked_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn caches_presence_and_absence() {
        let cache = LockCache::with_defaults();
        assert!(cache.get("a.rs").is_none());

        cache.store("a.rs", Some(lock_for("a1", "a.rs")));
        cache.store("b.rs", None);

        let hit = cache.get("a.rs").expect("hit");
        assert_eq!(hit.expect("lock").agent_id, "a1");
        let absent = cache.get("b.rs").expect("hit");
        assert!(absent.is_none());
    }

    #[test]
    fn lapsed_lease_reads_as_miss() {
        let cache = LockCache::with_defaults();
        let mut lock = lock_for("a1", "a.rs");
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);
        cache.store("a.rs", Some(lock));
        assert!(cache.get("a.rs").is_none());
        // absence entries are unaffected
        cache.store("b.rs", None);
        assert!(cache.get("b.rs").is_some());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = LockCache::new(10, Duration::from_millis(0));
        cache.store("a.rs", Some(lock_for("a1", "a.rs")));
        assert!(cache.get("a.rs").is_none());
    }

    #[test]
    fn invalidate_forces_next_read_to_miss() {
        let cache = LockCache::with_defaults();
        cache.store("a.rs", None);
        cache.invalidate("a.rs");
        assert!(cache.get("a.rs").is_none());
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = LockCache::new(2, Duration::from_secs(5));
        cache.store("a", None);
        cache.store("b", None);
        cache.store("c", None);
        // "a" was least recently used and has been evicted
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }
}
