//! Transactional application of proposed settings deltas.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result, UpdaterFailure};
use crate::registry::SettingRegistry;
use crate::snapshot::{simple_match, Settings, SettingsBuilder, SettingsPatch};
use crate::updater::{CommitFn, SettingUpdater};

/// Applies proposed settings deltas to all registered updaters, or to none
/// of them.
///
/// The reconciler owns the "last applied" baseline for its scope. All entry
/// points read and/or advance that baseline, so callers must serialize
/// access; `apply` takes `&mut self` to make the single-writer discipline
/// explicit in the type system.
pub struct SettingsReconciler {
    registry: Arc<SettingRegistry>,
    base: Settings,
    last_applied: Settings,
    updaters: Vec<Arc<dyn SettingUpdater>>,
}

impl SettingsReconciler {
    /// Create a reconciler over a registry, with the node's base settings
    /// as the merge floor for every proposed delta.
    pub fn new(registry: Arc<SettingRegistry>, base: Settings) -> Self {
        Self {
            registry,
            base,
            last_applied: Settings::new(),
            updaters: Vec::new(),
        }
    }

    /// The registry this reconciler validates against.
    pub fn registry(&self) -> &SettingRegistry {
        &self.registry
    }

    /// The last successfully applied settings baseline.
    pub fn last_applied(&self) -> &Settings {
        &self.last_applied
    }

    /// Register an updater. The updater list is append-only; components
    /// live for the process lifetime and are never deregistered.
    pub fn register_updater(&mut self, updater: Arc<dyn SettingUpdater>) {
        self.updaters.push(updater);
    }

    /// Register a consumer for one setting, which must already be present
    /// in the registry.
    ///
    /// # Errors
    /// `UnknownSetting` if the setting was never registered.
    pub fn register_update_consumer(
        &mut self,
        setting: &crate::setting::Setting,
        consumer: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<()> {
        if self.registry.resolve(setting.key()).is_none() {
            return Err(Error::unknown_setting(setting.key()));
        }
        self.register_updater(Arc::new(crate::updater::ConsumerUpdater::new(
            setting.clone(),
            consumer,
        )));
        Ok(())
    }

    /// Validate a proposed delta against every registered updater without
    /// applying anything.
    ///
    /// Exercises the full validation path of a real apply, but collects
    /// every updater's failure instead of stopping at the first, and never
    /// touches the last-applied baseline.
    ///
    /// # Errors
    /// `ValidationAggregate` naming every rejecting updater.
    pub fn dry_run(&self, proposed: &Settings) -> Result<Settings> {
        let current = self.base.merge(proposed);
        let previous = self.base.merge(&self.last_applied);
        let mut failures = Vec::new();
        for updater in &self.updaters {
            if !updater.has_changed(&current, &previous) {
                continue;
            }
            // Dropping the commit closure unexecuted is the rollback.
            if let Err(err) = updater.prepare(&current, &previous) {
                debug!(updater = updater.name(), error = %err, "settings dry run rejected");
                failures.push(UpdaterFailure {
                    updater: updater.name().to_string(),
                    reason: err.to_string(),
                });
            }
        }
        if failures.is_empty() {
            Ok(current)
        } else {
            Err(Error::validation_aggregate(failures))
        }
    }

    /// Apply a proposed delta to every registered updater, or to none.
    ///
    /// Two-phase: every changed updater's `prepare` runs first (fail-fast —
    /// unlike [`Self::dry_run`], the first failure aborts), and only once
    /// all commit closures exist are they run, in registration order. A
    /// failure discovered while computing any updater's value therefore
    /// prevents every updater's commit from running.
    ///
    /// The last-applied baseline advances to `proposed` *before* updaters
    /// are evaluated; this is the documented contract (operators wanting
    /// all-or-nothing validation dry-run first).
    ///
    /// # Errors
    /// The first failing updater's error.
    pub fn apply(&mut self, proposed: &Settings) -> Result<Settings> {
        if *proposed == self.last_applied {
            // nothing changed, don't bother the updaters
            return Ok(proposed.clone());
        }
        let previous = self.base.merge(&self.last_applied);
        self.last_applied = proposed.clone();
        let current = self.base.merge(proposed);

        let mut commits: Vec<(String, CommitFn)> = Vec::new();
        for updater in &self.updaters {
            if !updater.has_changed(&current, &previous) {
                continue;
            }
            let commit = updater.prepare(&current, &previous).map_err(|err| {
                warn!(updater = updater.name(), error = %err, "failed to prepare settings update");
                err
            })?;
            commits.push((updater.name().to_string(), commit));
        }
        for (name, commit) in commits {
            debug!(updater = %name, "applying settings update");
            commit();
        }
        Ok(current)
    }

    /// Stage a dynamic-only delta into `target`, recording applied puts in
    /// `diff`.
    ///
    /// Deletions (patch entries with no value) are expanded by simple `*`
    /// wildcard match against the target's current key set. Puts are
    /// allowed for keys resolving to dynamic settings, or for any
    /// registered key when `allow_static` is set, and each put is validated
    /// through the registry before staging. On error nothing is staged
    /// into `target`.
    ///
    /// Returns whether anything actually changed.
    ///
    /// # Errors
    /// `NotDynamic` naming the offending key and the caller's `context`
    /// label, or a validation error for an individual key.
    pub fn update_dynamic_only(
        &self,
        to_apply: &SettingsPatch,
        target: &mut SettingsBuilder,
        diff: &mut SettingsBuilder,
        allow_static: bool,
        context: &str,
    ) -> Result<bool> {
        update_dynamic_settings(&self.registry, to_apply, target, diff, allow_static, context)
    }
}

/// Free-function form of [`SettingsReconciler::update_dynamic_only`], for
/// callers that hold a registry but no reconciler (e.g. cluster-state
/// update tasks propagating settings).
///
/// # Errors
/// See [`SettingsReconciler::update_dynamic_only`].
pub fn update_dynamic_settings(
    registry: &SettingRegistry,
    to_apply: &SettingsPatch,
    target: &mut SettingsBuilder,
    diff: &mut SettingsBuilder,
    allow_static: bool,
    context: &str,
) -> Result<bool> {
    let mut changed = false;
    let mut staged = SettingsBuilder::new();
    let mut to_remove: Vec<String> = Vec::new();
    for (key, value) in to_apply.iter() {
        match value {
            None => to_remove.push(key.to_string()),
            Some(value) => {
                if allow_static || registry.is_dynamic(key) {
                    registry.validate(key, value)?;
                    staged.put(key, value);
                    diff.put(key, value);
                    changed = true;
                } else {
                    return Err(Error::not_dynamic(key, context));
                }
            }
        }
    }
    changed |= apply_deletes(&to_remove, target);
    target.put_all(&staged.build());
    Ok(changed)
}

/// Remove every target key matched by any of the given keys or `*`
/// wildcard patterns. Returns whether anything was removed.
pub fn apply_deletes(deletes: &[String], target: &mut SettingsBuilder) -> bool {
    let mut changed = false;
    for pattern in deletes {
        let matched: Vec<String> = target
            .keys()
            .filter(|key| simple_match(pattern, key))
            .map(ToString::to_string)
            .collect();
        for key in matched {
            target.remove(&key);
            changed = true;
        }
    }
    changed
}
