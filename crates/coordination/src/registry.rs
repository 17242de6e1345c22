//! Agent liveness and status tracking.

use std::sync::Arc;

use agent_coord_common::config::ACTIVE_AGENT_WINDOW_SECS;
use agent_coord_common::error::{CoordError, Result};
use agent_coord_common::keys::KeySpace;
use agent_coord_common::types::{AgentInfo, AgentStatus};
use agent_coord_common::CoordinationConfig;
use agent_coord_storage::{KvStore, KvStoreExt};
use chrono::Utc;

/// Tracks registered agents, their capabilities and last-seen timestamps.
///
/// The status record carries the coordination TTL; a time-ordered index
/// (score = unix seconds of last contact) backs the "active agents" view
/// with its 5-minute cutoff.
pub struct AgentRegistry {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl_secs: u64,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn KvStore>, config: &CoordinationConfig) -> Self {
        Self {
            store,
            keys: KeySpace::new(config.key_prefix.clone()),
            ttl_secs: config.coordination_ttl_secs,
        }
    }

    /// Register (or re-register) an agent. Idempotent: a repeat call
    /// refreshes TTL and the active index but keeps the original
    /// registration time.
    pub async fn register(
        &self,
        agent_id: &str,
        capabilities: Vec<String>,
        current_task: Option<String>,
    ) -> Result<AgentInfo> {
        let key = self.keys.agent(agent_id);
        let now = Utc::now();
        let existing: Option<AgentInfo> = self.store.get_json(&key).await?;

        let info = AgentInfo {
            agent_id: agent_id.to_string(),
            capabilities,
            status: AgentStatus::Idle,
            current_task,
            progress: None,
            registered_at: existing.map(|e| e.registered_at).unwrap_or(now),
            last_seen: now,
        };

        self.store.set_json_ex(&key, &info, self.ttl_secs).await?;
        self.touch_active_index(agent_id).await?;
        tracing::info!(agent = %agent_id, "agent registered");
        Ok(info)
    }

    /// Merge a status update into the agent's record and refresh its
    /// liveness. Fails for agents that never registered (or whose record
    /// already expired).
    pub async fn update_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
        current_task: Option<String>,
        progress: Option<u8>,
    ) -> Result<AgentInfo> {
        let key = self.keys.agent(agent_id);
        let Some(mut info) = self.store.get_json::<AgentInfo>(&key).await? else {
            return Err(CoordError::NotRegistered(agent_id.to_string()));
        };

        info.status = status;
        if current_task.is_some() {
            info.current_task = current_task;
        }
        if progress.is_some() {
            info.progress = progress;
        }
        info.last_seen = Utc::now();

        self.store.set_json_ex(&key, &info, self.ttl_secs).await?;
        self.touch_active_index(agent_id).await?;
        tracing::debug!(agent = %agent_id, status = %info.status, "agent status updated");
        Ok(info)
    }

    pub async fn get_status(&self, agent_id: &str) -> Result<Option<AgentInfo>> {
        self.store.get_json(&self.keys.agent(agent_id)).await
    }

    /// Agents seen within the activity window (or everyone the index
    /// remembers, with `include_inactive`). Status records that expired
    /// under their own TTL are silently dropped from the result.
    pub async fn list_agents(&self, include_inactive: bool) -> Result<Vec<AgentInfo>> {
        let cutoff = if include_inactive {
            f64::NEG_INFINITY
        } else {
            (Utc::now().timestamp() - ACTIVE_AGENT_WINDOW_SECS) as f64
        };

        let ids = self
            .store
            .zrange_by_score(&self.keys.active_agents(), cutoff, f64::INFINITY)
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.keys.agent(id)).collect();
        let records: Vec<Option<AgentInfo>> = self.store.mget_json(&keys).await?;
        Ok(records.into_iter().flatten().collect())
    }

    async fn touch_active_index(&self, agent_id: &str) -> Result<()> {
        self.store
            .zadd(
                &self.keys.active_agents(),
                agent_id,
                Utc::now().timestamp() as f64,
            )
            .await
    }
}
