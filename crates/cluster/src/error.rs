//! Error types for the cluster crate.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Cluster error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The named resource does not exist in the cluster state.
    #[error("resource '{resource}' not found in cluster state")]
    ResourceNotFound { resource: String },

    /// The resource's persisted lifecycle triple is partially set. The
    /// phase/action/step settings must be either all present or all absent.
    #[error("resource '{resource}' has a partial lifecycle state: {detail}")]
    CorruptLifecycleState { resource: String, detail: String },

    /// The serialized update executor has shut down.
    #[error("cluster-state update executor is stopped")]
    ExecutorStopped,

    /// A task-specific failure raised while executing an update task.
    #[error("cluster-state update task failed: {reason}")]
    Task { reason: String },

    /// A settings error raised while propagating settings through a task.
    #[error(transparent)]
    Settings(#[from] tidemark_settings::Error),
}

impl Error {
    /// Create a resource-not-found error.
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Create a corrupt-lifecycle-state error.
    pub fn corrupt_lifecycle_state(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CorruptLifecycleState {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    /// Create a task-failure error.
    pub fn task(reason: impl Into<String>) -> Self {
        Self::Task {
            reason: reason.into(),
        }
    }
}
