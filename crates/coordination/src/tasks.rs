//! Claim/release/progress/complete lifecycle for units of work.

use std::sync::Arc;

use agent_coord_common::error::{CoordError, Result};
use agent_coord_common::keys::{normalize_file_path, KeySpace};
use agent_coord_common::types::{ConflictReport, Severity, TaskRecord, TaskStatus};
use agent_coord_common::CoordinationConfig;
use agent_coord_storage::{KvStore, KvStoreExt};
use chrono::Utc;
use serde::Serialize;

use crate::locks::FileLockManager;

/// A successful claim plus the informational lock conflicts found at claim
/// time. Claiming does not acquire locks, so these are advisory unless the
/// blocking policy is enabled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub task: TaskRecord,
    pub conflicts: Vec<ConflictReport>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub available: usize,
    pub claimed: usize,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub tasks: Vec<TaskRecord>,
    pub counts: TaskCounts,
}

/// Task lifecycle manager. A task has at most one owner while claimed, and
/// only that owner may update, release or complete it.
pub struct TaskManager {
    store: Arc<dyn KvStore>,
    locks: Arc<FileLockManager>,
    keys: KeySpace,
    ttl_secs: u64,
    completed_ttl_secs: u64,
    block_on_locks: bool,
}

impl TaskManager {
    pub fn new(
        store: Arc<dyn KvStore>,
        locks: Arc<FileLockManager>,
        config: &CoordinationConfig,
    ) -> Self {
        Self {
            store,
            locks,
            keys: KeySpace::new(config.key_prefix.clone()),
            ttl_secs: config.coordination_ttl_secs,
            completed_ttl_secs: config.completed_task_ttl_secs(),
            block_on_locks: config.claim_block_on_locks,
        }
    }

    /// Claim a task for exclusive work. Fails if another agent holds the
    /// claim. The requested files are checked against current locks and any
    /// foreign holds come back as informational conflicts; with
    /// `claim_block_on_locks` those reject the claim instead.
    pub async fn claim_task(
        &self,
        task_id: &str,
        agent_id: &str,
        files: &[String],
        description: &str,
    ) -> Result<ClaimOutcome> {
        let key = self.keys.task(task_id);
        let existing: Option<TaskRecord> = self.store.get_json(&key).await?;

        if let Some(task) = &existing {
            if task.status == TaskStatus::Claimed {
                if let Some(owner) = &task.agent_id {
                    if owner != agent_id {
                        return Err(CoordError::TaskAlreadyClaimed {
                            task_id: task_id.to_string(),
                            agent_id: owner.clone(),
                        });
                    }
                }
            }
        }

        let files: Vec<String> = files.iter().map(|f| normalize_file_path(f)).collect();
        let lock_states = self.locks.check_file_locks(&files).await?;
        let conflicts: Vec<ConflictReport> = files
            .iter()
            .zip(&lock_states)
            .filter_map(|(file, state)| {
                state.as_ref().filter(|l| l.agent_id != agent_id).map(|l| {
                    ConflictReport {
                        file: file.clone(),
                        conflicting_agent: l.agent_id.clone(),
                        reason: if l.reason.is_empty() {
                            "file is locked".to_string()
                        } else {
                            l.reason.clone()
                        },
                        severity: Severity::High,
                    }
                })
            })
            .collect();

        if self.block_on_locks {
            if let Some(conflict) = conflicts.first() {
                return Err(CoordError::FileLocked {
                    file: conflict.file.clone(),
                    agent_id: conflict.conflicting_agent.clone(),
                });
            }
        }

        let now = Utc::now();
        let is_new = existing.is_none();
        let (prev_description, prev_progress, prev_message) = existing
            .map(|t| (t.description, t.progress, t.last_message))
            .unwrap_or_default();

        let record = TaskRecord {
            task_id: task_id.to_string(),
            agent_id: Some(agent_id.to_string()),
            files,
            description: if description.is_empty() {
                prev_description
            } else {
                description.to_string()
            },
            status: TaskStatus::Claimed,
            progress: prev_progress,
            last_message: prev_message,
            claimed_at: Some(now),
            released_at: None,
            completed_at: None,
            updated_at: now,
        };

        self.store.set_json_ex(&key, &record, self.ttl_secs).await?;
        if is_new {
            self.store
                .zadd(&self.keys.task_queue(), task_id, now.timestamp() as f64)
                .await?;
        }
        tracing::info!(task = %task_id, agent = %agent_id, conflicts = conflicts.len(), "task claimed");
        Ok(ClaimOutcome {
            task: record,
            conflicts,
        })
    }

    /// Give a claimed task back to the pool. Ownership-checked.
    pub async fn release_task(&self, task_id: &str, agent_id: &str) -> Result<TaskRecord> {
        let key = self.keys.task(task_id);
        let mut task = self.require_owned(&key, task_id, agent_id).await?;

        let now = Utc::now();
        task.status = TaskStatus::Available;
        task.agent_id = None;
        task.released_at = Some(now);
        task.updated_at = now;

        self.store.set_json_ex(&key, &task, self.ttl_secs).await?;
        tracing::info!(task = %task_id, agent = %agent_id, "task released");
        Ok(task)
    }

    /// Ownership-checked partial update of progress and status message.
    pub async fn update_task_progress(
        &self,
        task_id: &str,
        agent_id: &str,
        progress: u8,
        message: &str,
    ) -> Result<TaskRecord> {
        let key = self.keys.task(task_id);
        let mut task = self.require_owned(&key, task_id, agent_id).await?;

        task.progress = progress;
        if !message.is_empty() {
            task.last_message = Some(message.to_string());
        }
        task.updated_at = Utc::now();

        self.store.set_json_ex(&key, &task, self.ttl_secs).await?;
        Ok(task)
    }

    /// Mark a task done. The record's retention is extended well past the
    /// normal TTL so completions stay visible for audit reads.
    pub async fn complete_task(&self, task_id: &str, agent_id: &str) -> Result<TaskRecord> {
        let key = self.keys.task(task_id);
        let mut task = self.require_owned(&key, task_id, agent_id).await?;

        let now = Utc::now();
        task.status = TaskStatus::Completed;
        task.progress = 100;
        task.completed_at = Some(now);
        task.updated_at = now;

        self.store
            .set_json_ex(&key, &task, self.completed_ttl_secs)
            .await?;
        tracing::info!(task = %task_id, agent = %agent_id, "task completed");
        Ok(task)
    }

    /// All live tasks, filtered in memory, with counts by status. Counts
    /// cover the whole queue, not just the filtered view.
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        agent_id: Option<&str>,
    ) -> Result<TaskList> {
        let all = self.all_live_tasks().await?;

        let mut counts = TaskCounts {
            total: all.len(),
            ..TaskCounts::default()
        };
        for task in &all {
            match task.status {
                TaskStatus::Available => counts.available += 1,
                TaskStatus::Claimed => counts.claimed += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }

        let tasks = all
            .into_iter()
            .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
            .filter(|t| {
                agent_id
                    .map(|a| t.agent_id.as_deref() == Some(a))
                    .unwrap_or(true)
            })
            .collect();

        Ok(TaskList { tasks, counts })
    }

    /// Every task id in the queue index whose record is still live.
    /// Records that expired under their TTL drop out silently.
    pub async fn all_live_tasks(&self) -> Result<Vec<TaskRecord>> {
        let ids = self
            .store
            .zrange_by_score(&self.keys.task_queue(), f64::NEG_INFINITY, f64::INFINITY)
            .await?;
        let keys: Vec<String> = ids.iter().map(|id| self.keys.task(id)).collect();
        let records: Vec<Option<TaskRecord>> = self.store.mget_json(&keys).await?;
        Ok(records.into_iter().flatten().collect())
    }

    async fn require_owned(
        &self,
        key: &str,
        task_id: &str,
        agent_id: &str,
    ) -> Result<TaskRecord> {
        let Some(task) = self.store.get_json::<TaskRecord>(key).await? else {
            return Err(CoordError::TaskNotFound(task_id.to_string()));
        };
        match &task.agent_id {
            Some(owner) if owner == agent_id => Ok(task),
            _ => Err(CoordError::not_owner(agent_id, format!("task {task_id}"))),
        }
    }
}
