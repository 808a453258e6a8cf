//! Concrete cluster-state update tasks for settings propagation.

use std::sync::Arc;

use tidemark_settings::{update_dynamic_settings, SettingRegistry, SettingsBuilder, SettingsPatch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::ClusterState;
use crate::task::ClusterStateUpdateTask;

/// Applies a settings patch to one resource's settings, through the
/// dynamic-only update path.
///
/// Settings propagation reuses the same compare-and-swap task shape as
/// step advancement: the task re-reads the resource at execution time and
/// produces a new snapshot, or a no-op when nothing changed.
pub struct UpdateSettingsTask {
    resource: String,
    patch: SettingsPatch,
    registry: Arc<SettingRegistry>,
    allow_static: bool,
    context: String,
}

impl UpdateSettingsTask {
    /// Create a task applying `patch` to the named resource.
    pub fn new(
        resource: impl Into<String>,
        patch: SettingsPatch,
        registry: Arc<SettingRegistry>,
    ) -> Self {
        Self {
            resource: resource.into(),
            patch,
            registry,
            allow_static: false,
            context: "cluster-state".to_string(),
        }
    }

    /// Permit puts to static (non-dynamic) settings.
    pub fn allow_static(mut self) -> Self {
        self.allow_static = true;
        self
    }

    /// Label used in "not dynamically updateable" errors.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

impl ClusterStateUpdateTask for UpdateSettingsTask {
    fn execute(&self, state: &ClusterState) -> Result<ClusterState> {
        let metadata = state
            .resource(&self.resource)
            .ok_or_else(|| Error::resource_not_found(&self.resource))?;
        let mut target = metadata.settings().to_builder();
        let mut diff = SettingsBuilder::new();
        let changed = update_dynamic_settings(
            &self.registry,
            &self.patch,
            &mut target,
            &mut diff,
            self.allow_static,
            &self.context,
        )?;
        if !changed {
            return Ok(state.clone());
        }
        debug!(resource = %self.resource, applied = diff.len(), "propagating settings update");
        Ok(state.with_resource(metadata.clone().with_settings(target.build())))
    }
}
