//! Conflict detection over locks and claimed tasks.

use std::collections::BTreeSet;
use std::sync::Arc;

use agent_coord_common::error::Result;
use agent_coord_common::keys::normalize_file_path;
use agent_coord_common::types::{ConflictReport, Severity, TaskStatus};
use serde::Serialize;

use crate::locks::FileLockManager;
use crate::tasks::TaskManager;

/// Full conflict analysis for a candidate file set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheck {
    /// True only for hard conflicts; warnings never set this.
    pub has_conflict: bool,
    /// High severity: the file is locked by another agent.
    pub conflicts: Vec<ConflictReport>,
    /// Medium severity: the file is in another agent's claimed task.
    pub warnings: Vec<ConflictReport>,
}

/// Quick yes/no pre-flight answer without severity classification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapCheck {
    pub has_overlap: bool,
    pub overlapping_files: Vec<String>,
}

/// Reports, for a candidate file set and an agent identity, which files
/// would collide with other agents' locks or claimed tasks.
pub struct ConflictDetector {
    locks: Arc<FileLockManager>,
    tasks: Arc<TaskManager>,
}

impl ConflictDetector {
    pub fn new(locks: Arc<FileLockManager>, tasks: Arc<TaskManager>) -> Self {
        Self { locks, tasks }
    }

    /// Hard conflicts (foreign locks, via the batched cache path) and soft
    /// warnings (membership in another agent's claimed task). Files held or
    /// claimed by the calling agent itself never count.
    pub async fn detect_conflicts(
        &self,
        agent_id: &str,
        files: &[String],
    ) -> Result<ConflictCheck> {
        let normalized: Vec<String> = files.iter().map(|f| normalize_file_path(f)).collect();

        let lock_states = self.locks.check_file_locks(&normalized).await?;
        let conflicts: Vec<ConflictReport> = normalized
            .iter()
            .zip(&lock_states)
            .filter_map(|(file, state)| {
                state.as_ref().filter(|l| l.agent_id != agent_id).map(|l| {
                    ConflictReport {
                        file: file.clone(),
                        conflicting_agent: l.agent_id.clone(),
                        reason: format!("file is locked by {}", l.agent_id),
                        severity: Severity::High,
                    }
                })
            })
            .collect();

        let mut warnings = Vec::new();
        for task in self.tasks.all_live_tasks().await? {
            if task.status != TaskStatus::Claimed {
                continue;
            }
            let Some(owner) = task.agent_id.clone() else {
                continue;
            };
            if owner == agent_id {
                continue;
            }
            for file in &normalized {
                if task.files.contains(file) {
                    warnings.push(ConflictReport {
                        file: file.clone(),
                        conflicting_agent: owner.clone(),
                        reason: format!("file belongs to task {} claimed by {}", task.task_id, owner),
                        severity: Severity::Medium,
                    });
                }
            }
        }

        Ok(ConflictCheck {
            has_conflict: !conflicts.is_empty(),
            conflicts,
            warnings,
        })
    }

    /// Flat union of lock and claimed-task overlaps, deduplicated.
    pub async fn check_file_overlap(
        &self,
        agent_id: &str,
        files: &[String],
    ) -> Result<OverlapCheck> {
        let check = self.detect_conflicts(agent_id, files).await?;
        let overlapping: BTreeSet<String> = check
            .conflicts
            .into_iter()
            .chain(check.warnings)
            .map(|c| c.file)
            .collect();
        Ok(OverlapCheck {
            has_overlap: !overlapping.is_empty(),
            overlapping_files: overlapping.into_iter().collect(),
        })
    }
}
