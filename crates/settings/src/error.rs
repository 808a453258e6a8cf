//! Error types for the settings crate.

use itertools::Itertools;
use thiserror::Error;

use crate::setting::Scope;

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One updater's rejection of a proposed settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterFailure {
    /// Name of the rejecting updater.
    pub updater: String,
    /// Why it rejected the change.
    pub reason: String,
}

impl std::fmt::Display for UpdaterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.updater, self.reason)
    }
}

/// Settings error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Setting registered against a registry of a different scope.
    #[error("setting '{key}' must be a {expected} setting but was: {actual}")]
    ScopeMismatch {
        key: String,
        expected: Scope,
        actual: Scope,
    },

    /// Setting key does not match the key grammar for its kind.
    #[error("invalid setting key '{key}': must match {pattern}")]
    InvalidKey { key: String, pattern: &'static str },

    /// Key does not resolve to any registered setting.
    #[error("setting '{key}' is not registered")]
    UnknownSetting { key: String },

    /// Key resolves to a non-dynamic setting in a dynamic-only update.
    #[error("{context} setting '{key}', not dynamically updateable")]
    NotDynamic { key: String, context: String },

    /// A setting's validator rejected a proposed value.
    #[error("invalid value for setting '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// One or more updaters rejected the proposed change during a dry run.
    /// Every failure is collected so operators see all problems in one pass.
    #[error("failed to validate settings update: {}", .failures.iter().map(ToString::to_string).join("; "))]
    ValidationAggregate { failures: Vec<UpdaterFailure> },
}

impl Error {
    /// Create a scope mismatch error.
    pub fn scope_mismatch(key: impl Into<String>, expected: Scope, actual: Scope) -> Self {
        Self::ScopeMismatch {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, pattern: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            pattern,
        }
    }

    /// Create an unknown setting error.
    pub fn unknown_setting(key: impl Into<String>) -> Self {
        Self::UnknownSetting { key: key.into() }
    }

    /// Create a not-dynamically-updateable error.
    pub fn not_dynamic(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::NotDynamic {
            key: key.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an aggregated validation error from per-updater failures.
    pub fn validation_aggregate(failures: Vec<UpdaterFailure>) -> Self {
        Self::ValidationAggregate { failures }
    }
}
