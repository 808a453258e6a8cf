//! Command objects for step advancement, run inside the serialized
//! cluster-state executor.
//!
//! Both tasks re-read the resource's persisted step pointer at execution
//! time. A pointer that no longer matches what the submitter saw means
//! another transition already happened; the task is then a silent no-op —
//! the expected-key check, not last-writer-wins, is the race guard.

use std::sync::{Arc, RwLock};

use tidemark_cluster::{ClusterState, ClusterStateUpdateTask, ResourceMetadata};
use tracing::{debug, warn};

use crate::registry::StepRegistry;
use crate::step::{Step, StepKey, StepKind};

/// Shared, wholesale-replaceable step registry handle.
pub type SharedStepRegistry = Arc<RwLock<StepRegistry>>;

pub(crate) fn read_registry(registry: &SharedStepRegistry) -> std::sync::RwLockReadGuard<'_, StepRegistry> {
    registry
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Read the resource's persisted step key, if the triple is set.
pub(crate) fn persisted_step_key(
    metadata: &ResourceMetadata,
) -> tidemark_cluster::Result<Option<StepKey>> {
    Ok(metadata
        .lifecycle_state()?
        .as_ref()
        .map(StepKey::from_execution_state))
}

fn with_step_pointer(
    state: &ClusterState,
    metadata: &ResourceMetadata,
    key: &StepKey,
) -> ClusterState {
    state.with_resource(metadata.clone().with_lifecycle_state(&key.to_execution_state()))
}

/// Compare-and-move: advance a resource's step pointer from
/// `expected_key` to `next_key`, abandoning the move as stale when the
/// pointer has changed since the submitter read it.
///
/// `expected_key` of `None` means the submitter observed an uninitialized
/// pointer (the resource was implicitly at its policy's first step).
pub struct MoveToStepTask {
    resource: String,
    expected_key: Option<StepKey>,
    next_key: StepKey,
}

impl MoveToStepTask {
    /// Create a compare-and-move task.
    pub fn new(
        resource: impl Into<String>,
        expected_key: Option<StepKey>,
        next_key: StepKey,
    ) -> Self {
        Self {
            resource: resource.into(),
            expected_key,
            next_key,
        }
    }
}

impl ClusterStateUpdateTask for MoveToStepTask {
    fn execute(&self, state: &ClusterState) -> tidemark_cluster::Result<ClusterState> {
        let Some(metadata) = state.resource(&self.resource) else {
            // resource deleted since submission; nothing to move
            return Ok(state.clone());
        };
        let current = persisted_step_key(metadata)?;
        if current != self.expected_key {
            debug!(
                resource = %self.resource,
                expected = self.expected_key.as_ref().map(ToString::to_string).unwrap_or_default(),
                current = current.as_ref().map(ToString::to_string).unwrap_or_default(),
                "abandoning stale step move"
            );
            return Ok(state.clone());
        }
        debug!(
            resource = %self.resource,
            to = %self.next_key,
            "moving resource to next step"
        );
        Ok(with_step_pointer(state, metadata, &self.next_key))
    }
}

/// Execute a synchronous (metadata-only) step inside the serialized
/// executor: re-resolve the current step from the latest metadata, run it,
/// and advance the pointer on success.
///
/// `expected_key` of `None` means the submitter saw an uninitialized
/// resource (no persisted triple), which resolves to the policy's first
/// step.
pub struct ExecuteStepTask {
    policy: String,
    resource: String,
    expected_key: Option<StepKey>,
    registry: SharedStepRegistry,
}

impl ExecuteStepTask {
    /// Create an execute-step task.
    pub fn new(
        policy: impl Into<String>,
        resource: impl Into<String>,
        expected_key: Option<StepKey>,
        registry: SharedStepRegistry,
    ) -> Self {
        Self {
            policy: policy.into(),
            resource: resource.into(),
            expected_key,
            registry,
        }
    }

    fn resolve_step(&self, current: Option<&StepKey>) -> crate::error::Result<Step> {
        let registry = read_registry(&self.registry);
        match current {
            Some(key) => registry.step(&self.policy, key),
            None => registry.first_step(&self.policy),
        }
    }
}

impl ClusterStateUpdateTask for ExecuteStepTask {
    fn execute(&self, state: &ClusterState) -> tidemark_cluster::Result<ClusterState> {
        let Some(metadata) = state.resource(&self.resource) else {
            return Ok(state.clone());
        };
        let current = persisted_step_key(metadata)?;
        // guard against stale reads: another task may have advanced the
        // pointer between submission and execution
        if current != self.expected_key {
            debug!(
                resource = %self.resource,
                "skipping execute-step task for stale pointer"
            );
            return Ok(state.clone());
        }
        let step = match self.resolve_step(current.as_ref()) {
            Ok(step) => step,
            Err(err) => {
                // policy replaced underneath us; surface nothing here, the
                // next trigger reports it
                warn!(resource = %self.resource, policy = %self.policy, error = %err,
                    "cannot resolve step during execute-step task");
                return Ok(state.clone());
            }
        };
        match step.kind() {
            StepKind::ClusterStateAction(action) => {
                let new_state = action
                    .perform(&self.resource, state)
                    .map_err(into_cluster_error)?;
                Ok(advance_pointer(&new_state, &self.resource, &step))
            }
            StepKind::ClusterStateWait(wait) => {
                if wait
                    .is_condition_met(&self.resource, state)
                    .map_err(into_cluster_error)?
                {
                    Ok(advance_pointer(state, &self.resource, &step))
                } else if current.is_none() {
                    // first contact with this resource: initialize the
                    // pointer so metadata reflects where it is waiting
                    Ok(with_step_pointer(state, metadata, step.key()))
                } else {
                    Ok(state.clone())
                }
            }
            // the step kind changed since submission; not ours to run
            _ => Ok(state.clone()),
        }
    }
}

fn advance_pointer(state: &ClusterState, resource: &str, step: &Step) -> ClusterState {
    let Some(metadata) = state.resource(resource) else {
        // the action removed the resource; nothing left to point at
        return state.clone();
    };
    match step.next_key() {
        Some(next) => with_step_pointer(state, metadata, next),
        None => {
            warn!(resource = %resource, step = %step.key(),
                "non-terminal step has no successor, leaving pointer in place");
            with_step_pointer(state, metadata, step.key())
        }
    }
}

fn into_cluster_error(err: crate::error::Error) -> tidemark_cluster::Error {
    match err {
        crate::error::Error::Cluster(inner) => inner,
        crate::error::Error::Settings(inner) => tidemark_cluster::Error::Settings(inner),
        other => tidemark_cluster::Error::task(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::step::ClusterStateWaitStep;

    fn resource_at(key: Option<&StepKey>) -> ClusterState {
        let mut metadata = ResourceMetadata::new("idx-1").with_policy("p1");
        if let Some(key) = key {
            metadata = metadata.with_lifecycle_state(&key.to_execution_state());
        }
        ClusterState::new().with_resource(metadata)
    }

    #[test]
    fn move_to_step_commits_when_expected_key_matches() {
        let from = StepKey::new("hot", "rollover", "check");
        let to = StepKey::new("hot", "rollover", "do");
        let state = resource_at(Some(&from));

        let task = MoveToStepTask::new("idx-1", Some(from), to.clone());
        let next = task.execute(&state).unwrap();
        let persisted = persisted_step_key(next.resource("idx-1").unwrap()).unwrap();
        assert_eq!(persisted, Some(to));
    }

    #[test]
    fn move_to_step_initializes_uninitialized_pointer() {
        let to = StepKey::new("hot", "rollover", "do");
        let state = resource_at(None);

        let task = MoveToStepTask::new("idx-1", None, to.clone());
        let next = task.execute(&state).unwrap();
        let persisted = persisted_step_key(next.resource("idx-1").unwrap()).unwrap();
        assert_eq!(persisted, Some(to));
    }

    #[test]
    fn move_to_step_is_noop_when_stale() {
        let from = StepKey::new("hot", "rollover", "check");
        let elsewhere = StepKey::new("warm", "shrink", "wait");
        let to = StepKey::new("hot", "rollover", "do");
        let state = resource_at(Some(&elsewhere));

        let task = MoveToStepTask::new("idx-1", Some(from), to);
        let next = task.execute(&state).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn move_to_step_tolerates_deleted_resource() {
        let from = StepKey::new("hot", "rollover", "check");
        let to = StepKey::new("hot", "rollover", "do");
        let task = MoveToStepTask::new("idx-1", Some(from), to);
        let state = ClusterState::new();
        assert_eq!(task.execute(&state).unwrap(), state);
    }

    struct NeverMet;
    impl ClusterStateWaitStep for NeverMet {
        fn is_condition_met(&self, _: &str, _: &ClusterState) -> crate::error::Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn unmet_wait_on_initialized_resource_is_noop() {
        let key = StepKey::new("hot", "rollover", "wait");
        let mut registry = StepRegistry::new();
        registry.set_policy_steps(
            "p1",
            vec![Step::new(
                key.clone(),
                Some(StepKey::new("hot", "rollover", "next")),
                StepKind::ClusterStateWait(Arc::new(NeverMet)),
            )],
        );
        let registry = Arc::new(RwLock::new(registry));

        let state = resource_at(Some(&key));
        let task = ExecuteStepTask::new("p1", "idx-1", Some(key), registry);
        assert_eq!(task.execute(&state).unwrap(), state);
    }

    #[test]
    fn unmet_wait_initializes_absent_pointer() {
        let key = StepKey::new("hot", "rollover", "wait");
        let mut registry = StepRegistry::new();
        registry.set_policy_steps(
            "p1",
            vec![Step::new(
                key.clone(),
                Some(StepKey::new("hot", "rollover", "next")),
                StepKind::ClusterStateWait(Arc::new(NeverMet)),
            )],
        );
        let registry = Arc::new(RwLock::new(registry));

        let state = resource_at(None);
        let task = ExecuteStepTask::new("p1", "idx-1", None, registry);
        let next = task.execute(&state).unwrap();
        let persisted = persisted_step_key(next.resource("idx-1").unwrap()).unwrap();
        assert_eq!(persisted, Some(key));
    }
}
