//! The lifecycle state machine driver.

use std::sync::Arc;

use tidemark_cluster::ClusterService;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::step::{Step, StepKey, StepKind};
use crate::tasks::{
    persisted_step_key, read_registry, ExecuteStepTask, MoveToStepTask, SharedStepRegistry,
};

/// Why a policy run was triggered.
///
/// Triggers arrive from three independent sources that can race on the
/// same resource: the periodic scheduler, cluster-state-change listeners
/// (which fire on every metadata version bump, including the ones this
/// engine produces), and async operation completions. Cause-based
/// filtering keeps a cluster-state-change notification from re-entrantly
/// kicking off new side-effecting async work: only schedule ticks and
/// callback completions may initiate async steps, while state-change
/// notifications may only advance metadata-only steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCause {
    /// Periodic scheduler tick.
    Schedule,
    /// Cluster-state-changed notification.
    ClusterStateChange,
    /// Completion of an async step, or a committed synchronous move.
    Callback,
}

impl std::fmt::Display for TriggerCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schedule => write!(f, "schedule-trigger"),
            Self::ClusterStateChange => write!(f, "cluster-state-change"),
            Self::Callback => write!(f, "callback"),
        }
    }
}

/// Drives resources through their policies' step lists.
///
/// The runner holds no per-resource state and takes no locks around a run;
/// it is invoked re-entrantly from whichever thread delivers a trigger.
/// Exactly-once advancement comes from the expected-key guard inside the
/// update tasks plus the serialized executor, so a stale or duplicate
/// trigger is a safe no-op rather than a double advance.
pub struct LifecycleRunner {
    registry: SharedStepRegistry,
    cluster: Arc<ClusterService>,
}

impl LifecycleRunner {
    /// Create a runner over a step registry and the cluster service.
    pub fn new(registry: SharedStepRegistry, cluster: Arc<ClusterService>) -> Self {
        Self { registry, cluster }
    }

    /// Run the resource's current step, cascading through synchronous
    /// steps until an async suspension point, the terminal step, or a
    /// condition that is not yet met.
    ///
    /// # Errors
    /// `PolicyNotFound`/`StepNotFound` when the resource's persisted
    /// pointer cannot be resolved against the registry, a corrupt
    /// lifecycle triple, or an async step's surfaced failure.
    pub async fn run_policy(
        &self,
        policy: &str,
        resource: &str,
        cause: TriggerCause,
    ) -> Result<()> {
        let mut cause = cause;
        loop {
            let state = self.cluster.state();
            let Some(metadata) = state.resource(resource) else {
                debug!(resource = %resource, "resource no longer exists, nothing to run");
                return Ok(());
            };
            let current_key = persisted_step_key(metadata)?;
            let step = {
                let registry = read_registry(&self.registry);
                match &current_key {
                    Some(key) => registry.step(policy, key)?,
                    None => registry.first_step(policy)?,
                }
            };
            debug!(
                resource = %resource,
                step = %step.key(),
                kind = step.kind().name(),
                cause = %cause,
                "running policy step"
            );
            match step.kind() {
                StepKind::Terminal => {
                    // absorbing state
                    return Ok(());
                }
                StepKind::ClusterStateAction(_) | StepKind::ClusterStateWait(_) => {
                    // metadata-only kinds advance on any trigger cause
                    let task = ExecuteStepTask::new(
                        policy,
                        resource,
                        current_key.clone(),
                        Arc::clone(&self.registry),
                    );
                    let outcome = self
                        .cluster
                        .submit_update_task(
                            format!("lifecycle-execute-step [{}]", step.key()),
                            Box::new(task),
                        )
                        .await
                        .map_err(Error::from)?;
                    if !outcome.changed {
                        // condition unmet or the task found a stale pointer
                        return Ok(());
                    }
                    cause = TriggerCause::Callback;
                }
                StepKind::AsyncWait(wait) => {
                    if cause == TriggerCause::ClusterStateChange {
                        return Ok(());
                    }
                    let met = wait
                        .evaluate_condition(resource, Arc::clone(&state))
                        .await
                        .map_err(|err| {
                            error!(resource = %resource, step = %step.key(), error = %err,
                                "async wait step failed");
                            err
                        })?;
                    if !(met && self.move_to_step(resource, &step, current_key).await?) {
                        return Ok(());
                    }
                    cause = TriggerCause::Callback;
                }
                StepKind::AsyncAction(action) => {
                    if cause == TriggerCause::ClusterStateChange {
                        return Ok(());
                    }
                    let complete = action
                        .perform_action(resource, Arc::clone(&state))
                        .await
                        .map_err(|err| {
                            error!(resource = %resource, step = %step.key(), error = %err,
                                "async action step failed");
                            err
                        })?;
                    if !complete {
                        return Ok(());
                    }
                    if !action.resource_survives() {
                        debug!(resource = %resource, step = %step.key(),
                            "action consumed the resource, stopping");
                        return Ok(());
                    }
                    if !self.move_to_step(resource, &step, current_key).await? {
                        return Ok(());
                    }
                    cause = TriggerCause::Callback;
                }
            }
        }
    }

    /// Submit an atomic compare-and-move from the observed pointer to the
    /// step's successor. Returns whether the move committed; a stale guard
    /// is a silent false, not an error.
    async fn move_to_step(
        &self,
        resource: &str,
        step: &Step,
        observed: Option<StepKey>,
    ) -> Result<bool> {
        let Some(next) = step.next_key() else {
            debug!(resource = %resource, step = %step.key(), "no successor step to move to");
            return Ok(false);
        };
        info!(resource = %resource, from = %step.key(), to = %next, "moving to next step");
        let task = MoveToStepTask::new(resource, observed, next.clone());
        let outcome = self
            .cluster
            .submit_update_task(format!("lifecycle-move-to-step [{next}]"), Box::new(task))
            .await
            .map_err(Error::from)?;
        // a stale guard shows up as an unchanged state, never as an error
        Ok(outcome.changed)
    }
}
