//! The transactional setting-updater contract.

use std::sync::Arc;

use crate::error::Result;
use crate::setting::Setting;
use crate::snapshot::Settings;

/// Deferred commit closure produced by [`SettingUpdater::prepare`].
///
/// Commit is assumed infallible: all parsing and validation has already
/// happened in `prepare`, so the closure only publishes the computed value.
pub type CommitFn = Box<dyn FnOnce() + Send>;

/// A consumer of one or more settings, participating in transactional
/// reconciliation.
///
/// Updaters are registered at component construction, stored append-only,
/// and never removed. `prepare` must be pure and side-effect free: it does
/// all the heavy lifting (parsing, validation, computing the new value) and
/// returns a commit closure, so a dry run can exercise the full validation
/// path without changing anything. The reconciler only calls `prepare` when
/// `has_changed` is true, and only runs commit closures after every
/// updater's `prepare` has succeeded.
pub trait SettingUpdater: Send + Sync {
    /// Name used in logs and aggregated validation errors.
    fn name(&self) -> &str;

    /// Whether this updater's settings differ between the two snapshots.
    fn has_changed(&self, current: &Settings, previous: &Settings) -> bool;

    /// Compute the new value and return the deferred commit closure.
    ///
    /// # Errors
    /// Any validation or parse failure for the proposed value.
    fn prepare(&self, current: &Settings, previous: &Settings) -> Result<CommitFn>;
}

/// Updater binding one leaf setting to a consumer function.
///
/// The consumer receives the raw string value of the setting in the current
/// snapshot (empty string when the key is absent).
pub struct ConsumerUpdater {
    setting: Setting,
    consumer: Arc<dyn Fn(String) + Send + Sync>,
}

impl ConsumerUpdater {
    /// Bind a setting to a consumer.
    pub fn new(setting: Setting, consumer: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            setting,
            consumer: Arc::new(consumer),
        }
    }
}

impl SettingUpdater for ConsumerUpdater {
    fn name(&self) -> &str {
        self.setting.key()
    }

    fn has_changed(&self, current: &Settings, previous: &Settings) -> bool {
        current.get(self.setting.key()) != previous.get(self.setting.key())
    }

    fn prepare(&self, current: &Settings, _previous: &Settings) -> Result<CommitFn> {
        let value = current.get(self.setting.key()).unwrap_or_default().to_string();
        self.setting.validate_value(&value)?;
        let consumer = Arc::clone(&self.consumer);
        Ok(Box::new(move || consumer(value)))
    }
}
