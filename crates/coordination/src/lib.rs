//! Coordination core: lets independent, concurrently-running agents safely
//! share one work tree.
//!
//! - Agent registry with TTL-driven liveness ([`AgentRegistry`])
//! - Task claim/release/progress/complete lifecycle ([`TaskManager`])
//! - Exclusive, TTL-bounded file locks ([`FileLockManager`])
//! - Conflict detection over locks and claimed tasks ([`ConflictDetector`])
//! - Advisory recommendations for safe parallel work ([`CoordinationAdvisor`])
//!
//! All durable state lives in the shared store; mutual exclusion is
//! delegated to the store's per-key atomicity and every grant self-expires
//! via TTL, so a crashed agent never wedges the tree.

pub mod advisor;
pub mod conflict;
pub mod locks;
pub mod registry;
pub mod tasks;

pub use advisor::CoordinationAdvisor;
pub use conflict::ConflictDetector;
pub use locks::FileLockManager;
pub use registry::AgentRegistry;
pub use tasks::TaskManager;

use std::sync::Arc;

use agent_coord_common::CoordinationConfig;
use agent_coord_storage::{KvStore, LockCache};

/// All coordination managers wired over one store.
pub struct Coordination {
    pub registry: Arc<AgentRegistry>,
    pub tasks: Arc<TaskManager>,
    pub locks: Arc<FileLockManager>,
    pub conflicts: Arc<ConflictDetector>,
    pub advisor: Arc<CoordinationAdvisor>,
}

impl Coordination {
    pub fn new(store: Arc<dyn KvStore>, config: &CoordinationConfig) -> Self {
        let cache = Arc::new(LockCache::with_defaults());
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&store), config));
        let locks = Arc::new(FileLockManager::new(Arc::clone(&store), cache, config));
        let tasks = Arc::new(TaskManager::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            config,
        ));
        let conflicts = Arc::new(ConflictDetector::new(
            Arc::clone(&locks),
            Arc::clone(&tasks),
        ));
        let advisor = Arc::new(CoordinationAdvisor::new(
            Arc::clone(&registry),
            Arc::clone(&tasks),
            Arc::clone(&locks),
        ));

        Self {
            registry,
            tasks,
            locks,
            conflicts,
            advisor,
        }
    }
}
