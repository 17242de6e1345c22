//! Advisory layer: recommends what is safe to pick up right now.

use std::collections::BTreeSet;
use std::sync::Arc;

use agent_coord_common::error::Result;
use agent_coord_common::keys::normalize_file_path;
use agent_coord_common::types::{AgentInfo, AgentStatus, TaskRecord, TaskStatus};
use serde::Serialize;

use crate::locks::FileLockManager;
use crate::registry::AgentRegistry;
use crate::tasks::TaskManager;

const MAX_RECOMMENDED_TASKS: usize = 5;
const MAX_AVAILABLE_WORK: usize = 10;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub active_agents: usize,
    pub available_tasks: usize,
    pub claimed_tasks: usize,
    pub locked_files: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationAdvice {
    /// Preferred files nothing else is touching right now.
    pub safe_files: Vec<String>,
    /// One line per preferred file that is locked, naming the holder.
    pub warnings: Vec<String>,
    /// Available tasks worth picking up, capability matches first.
    pub recommended_tasks: Vec<TaskRecord>,
    pub workload: WorkloadSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWorkload {
    pub agent_id: String,
    pub status: AgentStatus,
    pub current_task: Option<String>,
    pub progress: Option<u8>,
    pub task_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDistribution {
    pub agents: Vec<AgentWorkload>,
    pub total_tasks: usize,
    pub unassigned_tasks: usize,
}

/// Aggregates registry, task and lock state into recommendations.
pub struct CoordinationAdvisor {
    registry: Arc<AgentRegistry>,
    tasks: Arc<TaskManager>,
    locks: Arc<FileLockManager>,
}

impl CoordinationAdvisor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        tasks: Arc<TaskManager>,
        locks: Arc<FileLockManager>,
    ) -> Self {
        Self {
            registry,
            tasks,
            locks,
        }
    }

    /// What can this agent safely work on? Safe files are the preferred
    /// files minus everything locked or sitting in any claimed task;
    /// recommended tasks are available ones, capability matches first.
    pub async fn suggest_coordination(
        &self,
        agent_id: &str,
        capabilities: &[String],
        preferred_files: &[String],
    ) -> Result<CoordinationAdvice> {
        let agents: Vec<AgentInfo> = self
            .registry
            .list_agents(false)
            .await?
            .into_iter()
            .filter(|a| a.agent_id != agent_id)
            .collect();
        let all_tasks = self.tasks.all_live_tasks().await?;
        let locks = self.locks.list_locked_files(None).await?;

        let locked_paths: BTreeSet<&str> = locks.iter().map(|l| l.file.as_str()).collect();
        let claimed_paths: BTreeSet<&str> = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Claimed)
            .flat_map(|t| t.files.iter().map(|f| f.as_str()))
            .collect();

        let mut safe_files = Vec::new();
        let mut warnings = Vec::new();
        for file in preferred_files {
            let file = normalize_file_path(file);
            if let Some(lock) = locks.iter().find(|l| l.file == file) {
                warnings.push(format!("{} is locked by {}", file, lock.agent_id));
                continue;
            }
            if !claimed_paths.contains(file.as_str()) && !locked_paths.contains(file.as_str()) {
                safe_files.push(file);
            }
        }

        let available: Vec<&TaskRecord> = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Available)
            .collect();
        let claimed_count = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Claimed)
            .count();

        // capability matches first, then the rest in queue order
        let mut recommended: Vec<TaskRecord> = available
            .iter()
            .filter(|t| matches_capabilities(t, capabilities))
            .map(|t| (*t).clone())
            .collect();
        for task in &available {
            if recommended.len() >= MAX_RECOMMENDED_TASKS {
                break;
            }
            if !matches_capabilities(task, capabilities) {
                recommended.push((*task).clone());
            }
        }
        recommended.truncate(MAX_RECOMMENDED_TASKS);

        Ok(CoordinationAdvice {
            safe_files,
            warnings,
            recommended_tasks: recommended,
            workload: WorkloadSummary {
                active_agents: agents.len(),
                available_tasks: available.len(),
                claimed_tasks: claimed_count,
                locked_files: locks.len(),
            },
        })
    }

    /// Per active agent: status, current task, progress and how many tasks
    /// it currently owns.
    pub async fn get_workload_distribution(&self) -> Result<WorkloadDistribution> {
        let agents = self.registry.list_agents(false).await?;
        let tasks = self.tasks.all_live_tasks().await?;

        let per_agent = agents
            .into_iter()
            .map(|agent| {
                let task_count = tasks
                    .iter()
                    .filter(|t| t.agent_id.as_deref() == Some(agent.agent_id.as_str()))
                    .count();
                AgentWorkload {
                    agent_id: agent.agent_id,
                    status: agent.status,
                    current_task: agent.current_task,
                    progress: agent.progress,
                    task_count,
                }
            })
            .collect();

        let unassigned = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Available)
            .count();

        Ok(WorkloadDistribution {
            agents: per_agent,
            total_tasks: tasks.len(),
            unassigned_tasks: unassigned,
        })
    }

    /// Unclaimed tasks matching the requested capability tags
    /// (case-insensitive substring match against the description). With no
    /// tags, every available task matches.
    pub async fn find_available_work(
        &self,
        _agent_id: &str,
        capabilities: &[String],
    ) -> Result<Vec<TaskRecord>> {
        let mut matches: Vec<TaskRecord> = self
            .tasks
            .all_live_tasks()
            .await?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Available)
            .filter(|t| matches_capabilities(t, capabilities))
            .collect();
        matches.truncate(MAX_AVAILABLE_WORK);
        Ok(matches)
    }
}

fn matches_capabilities(task: &TaskRecord, capabilities: &[String]) -> bool {
    if capabilities.is_empty() {
        return true;
    }
    let description = task.description.to_lowercase();
    capabilities
        .iter()
        .any(|cap| description.contains(&cap.to_lowercase()))
}
