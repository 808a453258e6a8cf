//! Wires the runner to its trigger sources.

use std::sync::Arc;
use std::time::Duration;

use tidemark_cluster::{ClusterService, ClusterState, ClusterStateListener};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::runner::{LifecycleRunner, TriggerCause};
use crate::tasks::{read_registry, SharedStepRegistry};

/// Default interval between schedule ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Connects the lifecycle runner to the periodic scheduler and the
/// cluster-state-changed notification stream.
///
/// The service itself is a [`ClusterStateListener`]: every committed state
/// change dispatches a `ClusterStateChange`-caused run for each
/// policy-managed resource, which can only advance metadata-only steps.
/// Schedule ticks dispatch `Schedule`-caused runs, which may also initiate
/// async work. Resources referencing a policy with no registered steps are
/// logged and skipped, never fatal for the tick.
pub struct LifecycleService {
    runner: Arc<LifecycleRunner>,
    cluster: Arc<ClusterService>,
    registry: SharedStepRegistry,
}

impl LifecycleService {
    /// Create the service. Call [`LifecycleService::attach`] to start
    /// receiving cluster-state-change triggers.
    pub fn new(cluster: Arc<ClusterService>, registry: SharedStepRegistry) -> Arc<Self> {
        let runner = Arc::new(LifecycleRunner::new(
            Arc::clone(&registry),
            Arc::clone(&cluster),
        ));
        Arc::new(Self {
            runner,
            cluster,
            registry,
        })
    }

    /// The underlying runner, for callers delivering their own triggers.
    pub fn runner(&self) -> &Arc<LifecycleRunner> {
        &self.runner
    }

    /// Register this service as a cluster-state listener.
    pub fn attach(self: &Arc<Self>) {
        self.cluster
            .add_listener(Arc::clone(self) as Arc<dyn ClusterStateListener>);
    }

    /// Run every policy-managed resource in the current state once.
    pub async fn trigger_policies(&self, cause: TriggerCause) {
        let state = self.cluster.state();
        dispatch(&self.runner, &self.registry, &state, cause).await;
    }

    /// Spawn the periodic schedule loop.
    pub fn start_schedule(self: &Arc<Self>, poll_interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                service.trigger_policies(TriggerCause::Schedule).await;
            }
        })
    }
}

impl ClusterStateListener for LifecycleService {
    fn cluster_state_changed(&self, state: &Arc<ClusterState>) {
        // listeners run on the executor loop; dispatch off of it so runs
        // can submit their own update tasks
        let runner = Arc::clone(&self.runner);
        let registry = Arc::clone(&self.registry);
        let state = Arc::clone(state);
        tokio::spawn(async move {
            dispatch(&runner, &registry, &state, TriggerCause::ClusterStateChange).await;
        });
    }
}

async fn dispatch(
    runner: &LifecycleRunner,
    registry: &SharedStepRegistry,
    state: &ClusterState,
    cause: TriggerCause,
) {
    let managed: Vec<(String, String)> = state
        .resources()
        .filter_map(|meta| {
            meta.policy_name()
                .map(|policy| (policy.to_string(), meta.name().to_string()))
        })
        .collect();
    for (policy, resource) in managed {
        let known = read_registry(registry).has_policy(&policy);
        if !known {
            debug!(resource = %resource, policy = %policy,
                "skipping resource with unregistered policy");
            continue;
        }
        if let Err(err) = runner.run_policy(&policy, &resource, cause).await {
            error!(resource = %resource, policy = %policy, cause = %cause, error = %err,
                "policy run failed");
        }
    }
}
