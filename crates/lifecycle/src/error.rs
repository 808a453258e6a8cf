//! Error types for the lifecycle crate.

use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle error types.
#[derive(Debug, Error)]
pub enum Error {
    /// No steps registered for the named policy.
    #[error("policy '{policy}' not found in step registry")]
    PolicyNotFound { policy: String },

    /// The policy is registered but has no step at the given key. Happens
    /// when a resource's persisted pointer references a step its policy no
    /// longer defines.
    #[error("step '{key}' not found in policy '{policy}'")]
    StepNotFound { policy: String, key: String },

    /// An async step's condition check or action reported failure. There
    /// is no retry at this layer; the external scheduler's next tick
    /// re-evaluates the same step.
    #[error("step '{key}' failed for resource '{resource}': {reason}")]
    StepFailed {
        resource: String,
        key: String,
        reason: String,
    },

    /// A cluster error raised while reading or mutating metadata.
    #[error(transparent)]
    Cluster(#[from] tidemark_cluster::Error),

    /// A settings error raised while reading resource metadata.
    #[error(transparent)]
    Settings(#[from] tidemark_settings::Error),
}

impl Error {
    /// Create a policy-not-found error.
    pub fn policy_not_found(policy: impl Into<String>) -> Self {
        Self::PolicyNotFound {
            policy: policy.into(),
        }
    }

    /// Create a step-not-found error.
    pub fn step_not_found(policy: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::StepNotFound {
            policy: policy.into(),
            key: key.to_string(),
        }
    }

    /// Create a step-failed error.
    pub fn step_failed(
        resource: impl Into<String>,
        key: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::StepFailed {
            resource: resource.into(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
