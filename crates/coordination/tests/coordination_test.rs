//! Coordination semantics exercised against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use agent_coord_common::error::CoordError;
use agent_coord_common::types::{AgentStatus, Severity, TaskStatus};
use agent_coord_common::CoordinationConfig;
use agent_coord_coordination::Coordination;
use agent_coord_storage::{KvStore, MemoryStore};

fn setup() -> Coordination {
    let store = Arc::new(MemoryStore::new()) as Arc<dyn KvStore>;
    Coordination::new(store, &CoordinationConfig::default())
}

fn files(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn lock_is_mutually_exclusive() {
    let coord = setup();
    coord
        .locks
        .lock_file("src/main.rs", "a1", "editing", None)
        .await
        .unwrap();

    let err = coord
        .locks
        .lock_file("src/main.rs", "a2", "also editing", None)
        .await
        .unwrap_err();
    match err {
        CoordError::FileLocked { file, agent_id } => {
            assert_eq!(file, "src/main.rs");
            assert_eq!(agent_id, "a1");
        }
        other => panic!("expected FileLocked, got {other}"),
    }
}

#[tokio::test]
async fn holder_can_refresh_own_lock() {
    let coord = setup();
    coord
        .locks
        .lock_file("src/lib.rs", "a1", "first pass", None)
        .await
        .unwrap();
    let refreshed = coord
        .locks
        .lock_file("src/lib.rs", "a1", "second pass", Some(60))
        .await
        .unwrap();
    assert_eq!(refreshed.agent_id, "a1");
    assert_eq!(refreshed.reason, "second pass");
}

#[tokio::test]
async fn unlock_requires_ownership_and_is_idempotent() {
    let coord = setup();
    coord
        .locks
        .lock_file("src/a.rs", "a1", "", None)
        .await
        .unwrap();

    let err = coord.locks.unlock_file("src/a.rs", "a2").await.unwrap_err();
    assert!(matches!(err, CoordError::NotOwner { .. }));

    let first = coord.locks.unlock_file("src/a.rs", "a1").await.unwrap();
    assert!(first.was_locked);
    let second = coord.locks.unlock_file("src/a.rs", "a1").await.unwrap();
    assert!(!second.was_locked);
}

#[tokio::test]
async fn expired_lock_can_be_reacquired() {
    let coord = setup();
    coord
        .locks
        .lock_file("src/b.rs", "a1", "", Some(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let lock = coord
        .locks
        .lock_file("src/b.rs", "a2", "", None)
        .await
        .unwrap();
    assert_eq!(lock.agent_id, "a2");
}

#[tokio::test]
async fn expired_lock_reads_as_absent_through_the_cache() {
    let coord = setup();
    coord
        .locks
        .lock_file("p.rs", "a1", "", Some(1))
        .await
        .unwrap();
    // live lease is visible, and now cached
    let held = coord.locks.check_file_lock("p.rs").await.unwrap();
    assert_eq!(held.unwrap().agent_id, "a1");

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(coord.locks.check_file_lock("p.rs").await.unwrap().is_none());

    // the batched conflict path agrees
    let check = coord
        .conflicts
        .detect_conflicts("a2", &files(&["p.rs"]))
        .await
        .unwrap();
    assert!(!check.has_conflict);
    assert!(check.conflicts.is_empty());
}

#[tokio::test]
async fn path_normalization_makes_spellings_collide() {
    let coord = setup();
    coord
        .locks
        .lock_file("/a\\b/c", "a1", "", None)
        .await
        .unwrap();

    let err = coord.locks.lock_file("a/b/c", "a2", "", None).await.unwrap_err();
    assert!(matches!(err, CoordError::FileLocked { .. }));

    let lock = coord.locks.check_file_lock("a\\b\\c").await.unwrap();
    assert_eq!(lock.unwrap().agent_id, "a1");
}

#[tokio::test]
async fn batch_lock_reports_per_file_failures() {
    let coord = setup();
    coord
        .locks
        .lock_file("src/taken.rs", "a1", "", None)
        .await
        .unwrap();

    let outcome = coord
        .locks
        .lock_files(&files(&["src/taken.rs", "src/free.rs"]), "a2", "batch", None)
        .await
        .unwrap();
    assert_eq!(outcome.locked.len(), 1);
    assert_eq!(outcome.locked[0].file, "src/free.rs");
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].file, "src/taken.rs");

    // the successful lock holds
    let lock = coord.locks.check_file_lock("src/free.rs").await.unwrap();
    assert_eq!(lock.unwrap().agent_id, "a2");
}

#[tokio::test]
async fn list_locked_files_filters_by_agent() {
    let coord = setup();
    coord.locks.lock_file("x.rs", "a1", "", None).await.unwrap();
    coord.locks.lock_file("y.rs", "a2", "", None).await.unwrap();

    let all = coord.locks.list_locked_files(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let mine = coord.locks.list_locked_files(Some("a1")).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].file, "x.rs");
}

#[tokio::test]
async fn claim_is_exclusive_but_reentrant_for_owner() {
    let coord = setup();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["f1.ts"]), "refactor")
        .await
        .unwrap();

    let err = coord
        .tasks
        .claim_task("t1", "a2", &[], "")
        .await
        .unwrap_err();
    match err {
        CoordError::TaskAlreadyClaimed { task_id, agent_id } => {
            assert_eq!(task_id, "t1");
            assert_eq!(agent_id, "a1");
        }
        other => panic!("expected TaskAlreadyClaimed, got {other}"),
    }

    // same owner may re-claim; description persists when omitted
    let outcome = coord.tasks.claim_task("t1", "a1", &[], "").await.unwrap();
    assert_eq!(outcome.task.description, "refactor");
}

#[tokio::test]
async fn claim_reports_foreign_locks_as_informational_conflicts() {
    let coord = setup();
    coord
        .locks
        .lock_file("f1.ts", "a1", "hotfix in flight", None)
        .await
        .unwrap();

    let outcome = coord
        .tasks
        .claim_task("t2", "a2", &files(&["f1.ts", "f2.ts"]), "feature")
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Claimed);
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].file, "f1.ts");
    assert_eq!(outcome.conflicts[0].conflicting_agent, "a1");
    assert_eq!(outcome.conflicts[0].reason, "hotfix in flight");
    assert_eq!(outcome.conflicts[0].severity, Severity::High);
}

#[tokio::test]
async fn blocking_policy_rejects_claims_over_foreign_locks() {
    let store = Arc::new(MemoryStore::new()) as Arc<dyn KvStore>;
    let config = CoordinationConfig {
        claim_block_on_locks: true,
        ..CoordinationConfig::default()
    };
    let coord = Coordination::new(store, &config);

    coord.locks.lock_file("f1.ts", "a1", "", None).await.unwrap();
    let err = coord
        .tasks
        .claim_task("t1", "a2", &files(&["f1.ts"]), "")
        .await
        .unwrap_err();
    assert!(matches!(err, CoordError::FileLocked { .. }));
}

#[tokio::test]
async fn lifecycle_is_ownership_checked() {
    let coord = setup();
    coord.tasks.claim_task("t1", "a1", &[], "work").await.unwrap();

    let err = coord.tasks.release_task("t1", "a2").await.unwrap_err();
    assert!(matches!(err, CoordError::NotOwner { .. }));
    let err = coord
        .tasks
        .update_task_progress("t1", "a2", 50, "")
        .await
        .unwrap_err();
    assert!(matches!(err, CoordError::NotOwner { .. }));
    let err = coord.tasks.complete_task("t1", "a2").await.unwrap_err();
    assert!(matches!(err, CoordError::NotOwner { .. }));

    let err = coord.tasks.release_task("missing", "a1").await.unwrap_err();
    assert!(matches!(err, CoordError::TaskNotFound(_)));
}

#[tokio::test]
async fn progress_release_complete_roundtrip() {
    let coord = setup();
    coord.tasks.claim_task("t1", "a1", &[], "work").await.unwrap();

    let task = coord
        .tasks
        .update_task_progress("t1", "a1", 40, "halfway-ish")
        .await
        .unwrap();
    assert_eq!(task.progress, 40);
    assert_eq!(task.last_message.as_deref(), Some("halfway-ish"));

    let task = coord.tasks.release_task("t1", "a1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Available);
    assert!(task.agent_id.is_none());
    assert!(task.released_at.is_some());

    coord.tasks.claim_task("t1", "a2", &[], "").await.unwrap();
    let task = coord.tasks.complete_task("t1", "a2").await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert!(task.completed_at.is_some());
}

#[tokio::test]
async fn list_tasks_counts_cover_all_tasks_before_filtering() {
    let coord = setup();
    coord.tasks.claim_task("t1", "a1", &[], "one").await.unwrap();
    coord.tasks.claim_task("t2", "a1", &[], "two").await.unwrap();
    coord.tasks.claim_task("t3", "a2", &[], "three").await.unwrap();
    coord.tasks.release_task("t2", "a1").await.unwrap();
    coord.tasks.complete_task("t3", "a2").await.unwrap();

    let list = coord
        .tasks
        .list_tasks(Some(TaskStatus::Claimed), None)
        .await
        .unwrap();
    assert_eq!(list.tasks.len(), 1);
    assert_eq!(list.tasks[0].task_id, "t1");
    assert_eq!(list.counts.available, 1);
    assert_eq!(list.counts.claimed, 1);
    assert_eq!(list.counts.completed, 1);
    assert_eq!(list.counts.total, 3);

    let mine = coord.tasks.list_tasks(None, Some("a1")).await.unwrap();
    assert_eq!(mine.tasks.len(), 1);
    assert_eq!(mine.tasks[0].task_id, "t1");
}

#[tokio::test]
async fn register_and_update_status() {
    let coord = setup();
    let info = coord
        .registry
        .register("a1", vec!["rust".to_string()], None)
        .await
        .unwrap();
    assert_eq!(info.status, AgentStatus::Idle);
    let registered_at = info.registered_at;

    let info = coord
        .registry
        .register("a1", vec!["rust".to_string(), "sql".to_string()], None)
        .await
        .unwrap();
    assert_eq!(info.registered_at, registered_at);

    let info = coord
        .registry
        .update_status("a1", AgentStatus::Working, Some("t1".to_string()), Some(10))
        .await
        .unwrap();
    assert_eq!(info.status, AgentStatus::Working);
    assert_eq!(info.current_task.as_deref(), Some("t1"));
    assert_eq!(info.progress, Some(10));

    // omitted fields keep their previous values
    let info = coord
        .registry
        .update_status("a1", AgentStatus::Blocked, None, None)
        .await
        .unwrap();
    assert_eq!(info.current_task.as_deref(), Some("t1"));
    assert_eq!(info.progress, Some(10));

    let err = coord
        .registry
        .update_status("ghost", AgentStatus::Idle, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordError::NotRegistered(_)));
}

#[tokio::test]
async fn list_agents_sees_recent_registrations() {
    let coord = setup();
    coord.registry.register("a1", vec![], None).await.unwrap();
    coord.registry.register("a2", vec![], None).await.unwrap();

    let active = coord.registry.list_agents(false).await.unwrap();
    assert_eq!(active.len(), 2);
    let all = coord.registry.list_agents(true).await.unwrap();
    assert_eq!(all.len(), 2);

    assert!(coord.registry.get_status("a1").await.unwrap().is_some());
    assert!(coord.registry.get_status("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn detect_conflicts_separates_locks_from_claim_warnings() {
    let coord = setup();
    coord
        .locks
        .lock_file("locked.rs", "a1", "", None)
        .await
        .unwrap();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["f1.ts", "f2.ts"]), "")
        .await
        .unwrap();

    let check = coord
        .conflicts
        .detect_conflicts("a2", &files(&["locked.rs", "f1.ts", "other.rs"]))
        .await
        .unwrap();
    assert!(check.has_conflict);
    assert_eq!(check.conflicts.len(), 1);
    assert_eq!(check.conflicts[0].file, "locked.rs");
    assert_eq!(check.conflicts[0].conflicting_agent, "a1");
    assert_eq!(check.warnings.len(), 1);
    assert_eq!(check.warnings[0].file, "f1.ts");
    assert!(check.warnings[0].reason.contains("t1"));
    assert!(check.warnings[0].reason.contains("a1"));
}

#[tokio::test]
async fn claim_warnings_alone_do_not_set_has_conflict() {
    let coord = setup();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["f1.ts", "f2.ts"]), "")
        .await
        .unwrap();

    let check = coord
        .conflicts
        .detect_conflicts("a2", &files(&["f1.ts"]))
        .await
        .unwrap();
    assert!(!check.has_conflict);
    assert!(check.conflicts.is_empty());
    assert_eq!(check.warnings.len(), 1);
    assert_eq!(check.warnings[0].severity, Severity::Medium);
}

#[tokio::test]
async fn own_activity_never_conflicts_with_itself() {
    let coord = setup();
    coord.locks.lock_file("f1.ts", "a1", "", None).await.unwrap();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["f2.ts"]), "")
        .await
        .unwrap();

    let check = coord
        .conflicts
        .detect_conflicts("a1", &files(&["f1.ts", "f2.ts"]))
        .await
        .unwrap();
    assert!(!check.has_conflict);
    assert!(check.conflicts.is_empty());
    assert!(check.warnings.is_empty());
}

#[tokio::test]
async fn file_overlap_unions_locks_and_claims() {
    let coord = setup();
    coord.locks.lock_file("f1.ts", "a1", "", None).await.unwrap();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["f2.ts"]), "")
        .await
        .unwrap();

    let overlap = coord
        .conflicts
        .check_file_overlap("a2", &files(&["f1.ts", "f2.ts", "f3.ts"]))
        .await
        .unwrap();
    assert!(overlap.has_overlap);
    assert_eq!(overlap.overlapping_files, vec!["f1.ts", "f2.ts"]);
}

#[tokio::test]
async fn lock_contention_resolves_after_release() {
    let coord = setup();
    coord
        .locks
        .lock_file("f1.ts", "a1", "editing", None)
        .await
        .unwrap();

    let err = coord.locks.lock_file("f1.ts", "a2", "", None).await.unwrap_err();
    match err {
        CoordError::FileLocked { agent_id, .. } => assert_eq!(agent_id, "a1"),
        other => panic!("expected FileLocked, got {other}"),
    }

    coord.locks.unlock_file("f1.ts", "a1").await.unwrap();
    let lock = coord.locks.lock_file("f1.ts", "a2", "", None).await.unwrap();
    assert_eq!(lock.agent_id, "a2");
}

#[tokio::test]
async fn advisor_flags_unsafe_preferred_files() {
    let coord = setup();
    coord.registry.register("a1", vec![], None).await.unwrap();
    coord.registry.register("a2", vec![], None).await.unwrap();
    coord
        .locks
        .lock_file("locked.rs", "a1", "", None)
        .await
        .unwrap();
    coord
        .tasks
        .claim_task("t1", "a1", &files(&["claimed.rs"]), "")
        .await
        .unwrap();

    let advice = coord
        .advisor
        .suggest_coordination("a2", &[], &files(&["locked.rs", "claimed.rs", "free.rs"]))
        .await
        .unwrap();
    assert_eq!(advice.safe_files, vec!["free.rs"]);
    assert_eq!(advice.warnings.len(), 1);
    assert!(advice.warnings[0].contains("locked.rs"));
    assert!(advice.warnings[0].contains("a1"));
    assert_eq!(advice.workload.active_agents, 1);
    assert_eq!(advice.workload.claimed_tasks, 1);
    assert_eq!(advice.workload.locked_files, 1);
}

#[tokio::test]
async fn advisor_recommends_capability_matches_first() {
    let coord = setup();
    for (id, description) in [
        ("t1", "tune the database indexes"),
        ("t2", "write rust bindings"),
        ("t3", "update docs"),
    ] {
        coord.tasks.claim_task(id, "seed", &[], description).await.unwrap();
        coord.tasks.release_task(id, "seed").await.unwrap();
    }

    let advice = coord
        .advisor
        .suggest_coordination("a1", &files(&["rust"]), &[])
        .await
        .unwrap();
    assert_eq!(advice.recommended_tasks[0].task_id, "t2");
    assert_eq!(advice.recommended_tasks.len(), 3);
    assert_eq!(advice.workload.available_tasks, 3);
}

#[tokio::test]
async fn find_available_work_matches_capabilities() {
    let coord = setup();
    for (id, description) in [
        ("t1", "tune the database indexes"),
        ("t2", "write Rust bindings"),
    ] {
        coord.tasks.claim_task(id, "seed", &[], description).await.unwrap();
        coord.tasks.release_task(id, "seed").await.unwrap();
    }
    coord.tasks.claim_task("t3", "a9", &[], "rust cleanup").await.unwrap();

    let matches = coord
        .advisor
        .find_available_work("a1", &files(&["rust"]))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].task_id, "t2");

    let everything = coord.advisor.find_available_work("a1", &[]).await.unwrap();
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn workload_distribution_counts_owned_tasks() {
    let coord = setup();
    coord.registry.register("a1", vec![], None).await.unwrap();
    coord.registry.register("a2", vec![], None).await.unwrap();
    coord.tasks.claim_task("t1", "a1", &[], "").await.unwrap();
    coord.tasks.claim_task("t2", "a1", &[], "").await.unwrap();
    coord.tasks.claim_task("t3", "a2", &[], "").await.unwrap();
    coord.tasks.release_task("t3", "a2").await.unwrap();

    let distribution = coord.advisor.get_workload_distribution().await.unwrap();
    assert_eq!(distribution.total_tasks, 3);
    assert_eq!(distribution.unassigned_tasks, 1);
    let a1 = distribution
        .agents
        .iter()
        .find(|a| a.agent_id == "a1")
        .unwrap();
    assert_eq!(a1.task_count, 2);
}
