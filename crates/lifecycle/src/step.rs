//! Step descriptors and the pluggable step behavior contracts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidemark_cluster::{ClusterState, LifecycleExecutionState};

use crate::error::Result;

/// Identity of one step within a policy: the (phase, action, name) tuple
/// persisted in resource metadata as the step pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey {
    phase: String,
    action: String,
    name: String,
}

impl StepKey {
    /// Create a step key.
    pub fn new(
        phase: impl Into<String>,
        action: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            action: action.into(),
            name: name.into(),
        }
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// The lifecycle action.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Convert the persisted settings triple into a step key.
    pub fn from_execution_state(state: &LifecycleExecutionState) -> Self {
        Self::new(&state.phase, &state.action, &state.step)
    }

    /// Convert into the persisted settings triple.
    pub fn to_execution_state(&self) -> LifecycleExecutionState {
        LifecycleExecutionState::new(&self.phase, &self.action, &self.name)
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.phase, self.action, self.name)
    }
}

/// A synchronous, metadata-only step: a pure function of cluster state.
pub trait ClusterStateActionStep: Send + Sync {
    /// Compute the new cluster state for this step.
    ///
    /// # Errors
    /// Step-specific failures; an error aborts the containing update task.
    fn perform(&self, resource: &str, state: &ClusterState) -> Result<ClusterState>;
}

/// A synchronous wait step: a pure predicate over cluster state.
pub trait ClusterStateWaitStep: Send + Sync {
    /// Whether the awaited condition holds in the given state.
    ///
    /// # Errors
    /// Step-specific failures; an error aborts the containing update task.
    fn is_condition_met(&self, resource: &str, state: &ClusterState) -> Result<bool>;
}

/// An asynchronous side-effecting step (e.g. a rollover or shrink call).
///
/// The returned future resolves exactly once with either the completion
/// flag or an error, so success and failure are mutually exclusive by
/// construction.
#[async_trait]
pub trait AsyncActionStep: Send + Sync {
    /// Perform the external operation. `Ok(true)` means complete (the
    /// resource may advance), `Ok(false)` means not yet complete.
    ///
    /// # Errors
    /// The operation's failure, surfaced fatally for this resource's
    /// progress.
    async fn perform_action(&self, resource: &str, state: Arc<ClusterState>) -> Result<bool>;

    /// Whether the resource still exists after a completed action.
    /// Deletion-style actions return false, stopping the cascade cleanly.
    fn resource_survives(&self) -> bool {
        true
    }
}

/// An asynchronous condition poll against an external system.
#[async_trait]
pub trait AsyncWaitStep: Send + Sync {
    /// Evaluate the condition. `Ok(true)` permits advancing; `Ok(false)`
    /// leaves the resource at this step until the next trigger.
    ///
    /// # Errors
    /// The poll's failure, surfaced fatally for this resource's progress.
    async fn evaluate_condition(&self, resource: &str, state: Arc<ClusterState>) -> Result<bool>;
}

/// The closed set of step capabilities the runner dispatches over.
///
/// Adding a variant forces every match site to be revisited.
#[derive(Clone)]
pub enum StepKind {
    /// Metadata-only transform, applied inside an update task.
    ClusterStateAction(Arc<dyn ClusterStateActionStep>),
    /// Metadata-only condition, evaluated inside an update task.
    ClusterStateWait(Arc<dyn ClusterStateWaitStep>),
    /// External side-effecting operation with async completion.
    AsyncAction(Arc<dyn AsyncActionStep>),
    /// External condition poll with async completion.
    AsyncWait(Arc<dyn AsyncWaitStep>),
    /// Absorbing state: triggers are no-ops.
    Terminal,
}

impl StepKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClusterStateAction(_) => "cluster-state-action",
            Self::ClusterStateWait(_) => "cluster-state-wait",
            Self::AsyncAction(_) => "async-action",
            Self::AsyncWait(_) => "async-wait",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Debug for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One immutable step descriptor in a policy's ordered step list.
///
/// Steps carry no per-resource state; they know their own key, the key of
/// their successor (`None` at the terminal step), and their behavior.
#[derive(Debug, Clone)]
pub struct Step {
    key: StepKey,
    next_key: Option<StepKey>,
    kind: StepKind,
}

impl Step {
    /// Create a step descriptor.
    pub fn new(key: StepKey, next_key: Option<StepKey>, kind: StepKind) -> Self {
        Self {
            key,
            next_key,
            kind,
        }
    }

    /// Create the terminal step for a policy.
    pub fn terminal(key: StepKey) -> Self {
        Self::new(key, None, StepKind::Terminal)
    }

    /// This step's key.
    pub fn key(&self) -> &StepKey {
        &self.key
    }

    /// The successor's key, or `None` at the terminal step.
    pub fn next_key(&self) -> Option<&StepKey> {
        self.next_key.as_ref()
    }

    /// The step's capability variant.
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn step_key_display_and_triple_round_trip() {
        let key = StepKey::new("hot", "rollover", "check-condition");
        assert_eq!(key.to_string(), "hot/rollover/check-condition");

        let triple = key.to_execution_state();
        assert_eq!(triple.phase, "hot");
        assert_eq!(triple.action, "rollover");
        assert_eq!(triple.step, "check-condition");
        assert_eq!(StepKey::from_execution_state(&triple), key);
    }

    #[test]
    fn terminal_step_has_no_successor() {
        let step = Step::terminal(StepKey::new("delete", "complete", "terminal"));
        assert!(step.next_key().is_none());
        assert_eq!(step.kind().name(), "terminal");
    }
}
