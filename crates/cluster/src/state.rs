//! Immutable cluster-state snapshots and per-resource lifecycle metadata.

use serde::{Deserialize, Serialize};
use tidemark_settings::Settings;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Settings key holding the name of the policy managing a resource.
pub const LIFECYCLE_POLICY: &str = "lifecycle.name";
/// Settings key holding the current lifecycle phase.
pub const LIFECYCLE_PHASE: &str = "lifecycle.phase";
/// Settings key holding the current lifecycle action.
pub const LIFECYCLE_ACTION: &str = "lifecycle.action";
/// Settings key holding the current lifecycle step.
pub const LIFECYCLE_STEP: &str = "lifecycle.step";

/// The persisted lifecycle step pointer: three sibling string settings,
/// either all present or all absent. Partial presence is a corruption
/// error, not a recoverable state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleExecutionState {
    pub phase: String,
    pub action: String,
    pub step: String,
}

impl LifecycleExecutionState {
    /// Create a lifecycle execution state.
    pub fn new(
        phase: impl Into<String>,
        action: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            action: action.into(),
            step: step.into(),
        }
    }

    /// Read the triple from a settings snapshot.
    ///
    /// # Errors
    /// `CorruptLifecycleState` when only some of the three keys are set.
    pub fn from_settings(resource: &str, settings: &Settings) -> Result<Option<Self>> {
        let phase = settings.get(LIFECYCLE_PHASE);
        let action = settings.get(LIFECYCLE_ACTION);
        let step = settings.get(LIFECYCLE_STEP);
        match (phase, action, step) {
            (Some(phase), Some(action), Some(step)) => Ok(Some(Self::new(phase, action, step))),
            (None, None, None) => Ok(None),
            _ => Err(Error::corrupt_lifecycle_state(
                resource,
                format!(
                    "phase={phase:?} action={action:?} step={step:?} (must be all set or all absent)"
                ),
            )),
        }
    }
}

impl std::fmt::Display for LifecycleExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.phase, self.action, self.step)
    }
}

/// Metadata for one long-lived, named resource (e.g. an index).
///
/// Resource metadata is only ever replaced wholesale through cluster-state
/// update tasks, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    name: String,
    uuid: Uuid,
    settings: Settings,
}

impl ResourceMetadata {
    /// Create metadata for a new resource with empty settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            settings: Settings::new(),
        }
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The resource's settings snapshot.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings snapshot, producing new metadata.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// The name of the policy managing this resource, if any.
    pub fn policy_name(&self) -> Option<&str> {
        self.settings.get(LIFECYCLE_POLICY)
    }

    /// Assign the managing policy, producing new metadata.
    pub fn with_policy(self, policy: impl Into<String>) -> Self {
        let mut builder = self.settings.to_builder();
        builder.put(LIFECYCLE_POLICY, policy.into());
        let settings = builder.build();
        self.with_settings(settings)
    }

    /// Read the persisted lifecycle step pointer.
    ///
    /// # Errors
    /// `CorruptLifecycleState` when the triple is partially set.
    pub fn lifecycle_state(&self) -> Result<Option<LifecycleExecutionState>> {
        LifecycleExecutionState::from_settings(&self.name, &self.settings)
    }

    /// Write the lifecycle step pointer, producing new metadata.
    pub fn with_lifecycle_state(self, state: &LifecycleExecutionState) -> Self {
        let mut builder = self.settings.to_builder();
        builder
            .put(LIFECYCLE_PHASE, state.phase.clone())
            .put(LIFECYCLE_ACTION, state.action.clone())
            .put(LIFECYCLE_STEP, state.step.clone());
        let settings = builder.build();
        self.with_settings(settings)
    }
}

/// An immutable, versioned snapshot of the cluster metadata.
///
/// Snapshots are never mutated in place: every update produces a new value
/// via the `with_*` builders, submitted for atomic replacement through the
/// serialized update executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterState {
    version: u64,
    resources: im::HashMap<String, ResourceMetadata>,
}

impl ClusterState {
    /// Create an empty state at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Produce a snapshot with the version advanced by one.
    pub fn bump_version(&self) -> Self {
        Self {
            version: self.version.wrapping_add(1),
            resources: self.resources.clone(),
        }
    }

    /// Look up a resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceMetadata> {
        self.resources.get(name)
    }

    /// Iterate over all resources.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceMetadata> {
        self.resources.values()
    }

    /// Number of resources in the snapshot.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Produce a snapshot with the given resource inserted or replaced.
    pub fn with_resource(&self, metadata: ResourceMetadata) -> Self {
        Self {
            version: self.version,
            resources: self.resources.update(metadata.name().to_string(), metadata),
        }
    }

    /// Produce a snapshot with the named resource removed.
    pub fn without_resource(&self, name: &str) -> Self {
        Self {
            version: self.version,
            resources: self.resources.without(name),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn lifecycle_triple_all_or_nothing() {
        let absent = ResourceMetadata::new("idx-1");
        assert_eq!(absent.lifecycle_state().unwrap(), None);

        let set = absent
            .clone()
            .with_lifecycle_state(&LifecycleExecutionState::new("hot", "rollover", "check"));
        let state = set.lifecycle_state().unwrap().unwrap();
        assert_eq!(state.to_string(), "hot/rollover/check");

        let mut partial = Settings::builder();
        partial.put(LIFECYCLE_PHASE, "hot");
        let corrupt = ResourceMetadata::new("idx-2").with_settings(partial.build());
        assert!(matches!(
            corrupt.lifecycle_state(),
            Err(Error::CorruptLifecycleState { .. })
        ));
    }

    #[test]
    fn with_resource_leaves_original_snapshot_untouched() {
        let state = ClusterState::new();
        let next = state.with_resource(ResourceMetadata::new("idx-1"));
        assert_eq!(state.resource_count(), 0);
        assert_eq!(next.resource_count(), 1);
        assert_eq!(next.version(), state.version());
        assert_eq!(next.bump_version().version(), 1);
    }

    #[test]
    fn policy_name_round_trips_through_settings() {
        let meta = ResourceMetadata::new("idx-1").with_policy("hot-warm");
        assert_eq!(meta.policy_name(), Some("hot-warm"));
        assert_eq!(meta.settings().get(LIFECYCLE_POLICY), Some("hot-warm"));
    }
}
