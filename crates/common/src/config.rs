use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};

/// Agents drop out of `list_agents` after this much silence.
pub const ACTIVE_AGENT_WINDOW_SECS: i64 = 300;

/// Interval between store liveness pings.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Shared store connection URL.
    pub redis_url: String,
    /// Default TTL for locks, claims and agent status records (seconds).
    pub coordination_ttl_secs: u64,
    /// Bound on a single store connect attempt (seconds).
    pub connect_timeout_secs: u64,
    /// Key prefix isolating this service from unrelated data in the store.
    pub key_prefix: String,
    /// When true, `claim_task` rejects claims whose files are locked by
    /// another agent instead of reporting them as informational conflicts.
    pub claim_block_on_locks: bool,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            coordination_ttl_secs: 3600,
            connect_timeout_secs: 5,
            key_prefix: "coord".to_string(),
            claim_block_on_locks: false,
        }
    }
}

impl CoordinationConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(raw) = std::env::var("COORDINATION_TTL_SECS") {
            config.coordination_ttl_secs = raw
                .parse()
                .map_err(|_| CoordError::config(format!("invalid COORDINATION_TTL_SECS: {raw}")))?;
        }
        if let Ok(raw) = std::env::var("CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = raw
                .parse()
                .map_err(|_| CoordError::config(format!("invalid CONNECT_TIMEOUT_SECS: {raw}")))?;
        }
        if let Ok(prefix) = std::env::var("KEY_PREFIX") {
            if prefix.is_empty() {
                return Err(CoordError::config("KEY_PREFIX must not be empty"));
            }
            config.key_prefix = prefix;
        }
        if let Ok(raw) = std::env::var("CLAIM_BLOCK_ON_LOCKS") {
            config.claim_block_on_locks = matches!(raw.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Completed tasks are retained far longer than active ones, to support
    /// later audit/history reads.
    pub fn completed_task_ttl_secs(&self) -> u64 {
        self.coordination_ttl_secs * 24
    }
}
