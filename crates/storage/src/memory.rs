//! In-memory [`KvStore`] with real TTL bookkeeping, used by tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use agent_coord_common::error::Result;
use async_trait::async_trait;

use crate::store::KvStore;

struct Entry {
    value: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.deadline.map(|d| Instant::now() < d).unwrap_or(true)
    }
}

/// Test substitute for the Redis store. Expiry is enforced lazily on read,
/// which matches how callers observe TTL through the real store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    sorted: Mutex<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Match a key against a `*` glob pattern (the only pattern shape the
/// coordination layer uses).
fn glob_match(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).map(Entry::is_live).unwrap_or(false) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries
            .remove(key)
            .map(|entry| entry.is_live())
            .unwrap_or(false))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.is_live());
        let mut matched: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .map(|key| match entries.get(key) {
                Some(entry) if entry.is_live() => Some(entry.value.clone()),
                Some(_) => {
                    entries.remove(key);
                    None
                }
                None => None,
            })
            .collect())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut sorted = self.sorted.lock().unwrap();
        sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let sorted = self.sorted.lock().unwrap();
        let Some(members) = sorted.get(key) else {
            return Ok(Vec::new());
        };
        let mut in_range: Vec<(&String, f64)> = members
            .iter()
            .filter(|(_, score)| **score >= min && **score <= max)
            .map(|(member, score)| (member, *score))
            .collect();
        in_range.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(in_range.into_iter().map(|(member, _)| member.clone()).collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStoreExt;

    #[test]
    fn glob_matches_lock_patterns() {
        assert!(glob_match("coord:lock:*", "coord:lock:src/x.ts"));
        assert!(!glob_match("coord:lock:*", "coord:task:t1"));
        assert!(glob_match("coord:agent:a1", "coord:agent:a1"));
        assert!(glob_match("*:lock:*", "coord:lock:a"));
    }

    #[tokio::test]
    async fn set_nx_respects_existing_key() {
        let store = MemoryStore::new();
        assert!(store.set_nx_ex("k", "first", 60).await.unwrap());
        assert!(!store.set_nx_ex("k", "second", 60).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // and the slot is free for NX again
        assert!(store.set_nx_ex("k", "v2", 60).await.unwrap());
    }

    #[tokio::test]
    async fn zrange_orders_by_score() {
        let store = MemoryStore::new();
        store.zadd("z", "b", 2.0).await.unwrap();
        store.zadd("z", "a", 1.0).await.unwrap();
        store.zadd("z", "c", 3.0).await.unwrap();
        let all = store
            .zrange_by_score("z", f64::NEG_INFINITY, f64::INFINITY)
            .await
            .unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);
        let recent = store.zrange_by_score("z", 2.0, f64::INFINITY).await.unwrap();
        assert_eq!(recent, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn json_round_trip() {
        let store = MemoryStore::new();
        store.set_json_ex("k", &vec![1, 2, 3], 60).await.unwrap();
        let back: Option<Vec<i32>> = store.get_json("k").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }
}
