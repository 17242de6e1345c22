use thiserror::Error;

/// Core error type for all coordination failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoordError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent not registered: {0}")]
    NotRegistered(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {task_id} already claimed by {agent_id}")]
    TaskAlreadyClaimed { task_id: String, agent_id: String },

    #[error("File {file} is locked by {agent_id}")]
    FileLocked { file: String, agent_id: String },

    #[error("{agent_id} does not own {resource}")]
    NotOwner { agent_id: String, resource: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoordError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an ownership error
    pub fn not_owner(agent_id: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::NotOwner {
            agent_id: agent_id.into(),
            resource: resource.into(),
        }
    }

    /// "Try again later" rather than "request is invalid"
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
