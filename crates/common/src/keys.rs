//! Deterministic key naming so every agent addresses the same logical
//! resource, plus the path normalization that gives locks their identity.

/// Normalize a file path: backslashes become forward slashes and leading
/// separators are stripped. The normalized form is the identity of a lock,
/// so `"/a\b/c"`, `"a/b/c"` and `"a\b\c"` all collide correctly.
pub fn normalize_file_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Key builders under one service-specific prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn agent(&self, agent_id: &str) -> String {
        format!("{}:agent:{}", self.prefix, agent_id)
    }

    pub fn task(&self, task_id: &str) -> String {
        format!("{}:task:{}", self.prefix, task_id)
    }

    pub fn lock(&self, file: &str) -> String {
        format!("{}:lock:{}", self.prefix, normalize_file_path(file))
    }

    /// Scan pattern covering every live lock key.
    pub fn lock_pattern(&self) -> String {
        format!("{}:lock:*", self.prefix)
    }

    /// Recover the normalized file path from a lock key.
    pub fn file_from_lock_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&format!("{}:lock:", self.prefix))
    }

    /// Time-ordered index of active agents (score = unix seconds last seen).
    pub fn active_agents(&self) -> String {
        format!("{}:agents:active", self.prefix)
    }

    /// Time-ordered index of every known task id.
    pub fn task_queue(&self) -> String {
        format!("{}:tasks:queue", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_spellings() {
        let a = normalize_file_path("/a\\b/c");
        let b = normalize_file_path("a/b/c");
        let c = normalize_file_path("a\\b\\c");
        assert_eq!(a, "a/b/c");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn normalization_strips_all_leading_separators() {
        assert_eq!(normalize_file_path("//src/main.rs"), "src/main.rs");
        assert_eq!(normalize_file_path("\\src\\main.rs"), "src/main.rs");
    }

    #[test]
    fn lock_keys_use_normalized_path() {
        let keys = KeySpace::new("coord");
        assert_eq!(keys.lock("/src\\x.ts"), "coord:lock:src/x.ts");
        assert_eq!(keys.lock("src/x.ts"), "coord:lock:src/x.ts");
    }

    #[test]
    fn file_round_trips_through_lock_key() {
        let keys = KeySpace::new("coord");
        let key = keys.lock("src/lib.rs");
        assert_eq!(keys.file_from_lock_key(&key), Some("src/lib.rs"));
        assert_eq!(keys.file_from_lock_key("other:lock:x"), None);
    }

    #[test]
    fn keys_are_namespaced_by_prefix() {
        let keys = KeySpace::new("coord");
        assert_eq!(keys.agent("a1"), "coord:agent:a1");
        assert_eq!(keys.task("t1"), "coord:task:t1");
        assert_eq!(keys.active_agents(), "coord:agents:active");
        assert_eq!(keys.task_queue(), "coord:tasks:queue");
    }
}
