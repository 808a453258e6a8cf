//! Registry of known settings for one scope.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::setting::{Scope, Setting};

/// Holds the set of known settings for one scope: exact leaf keys plus
/// group matchers. Populated once at bootstrap; immutable afterwards.
///
/// Resolution is deterministic only if group prefixes are non-overlapping.
/// That is a caller responsibility and is not enforced here; overlapping
/// groups resolve in registration order.
#[derive(Debug)]
pub struct SettingRegistry {
    scope: Scope,
    key_settings: HashMap<String, Setting>,
    group_settings: Vec<Setting>,
}

impl SettingRegistry {
    /// Create an empty registry for the given scope.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            key_settings: HashMap::new(),
            group_settings: Vec::new(),
        }
    }

    /// Create a registry pre-populated with a set of settings.
    ///
    /// # Errors
    /// Fails on the first setting with a mismatched scope or invalid key.
    pub fn with_settings(
        scope: Scope,
        settings: impl IntoIterator<Item = Setting>,
    ) -> Result<Self> {
        let mut registry = Self::new(scope);
        for setting in settings {
            registry.register(setting)?;
        }
        Ok(registry)
    }

    /// The scope this registry covers.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Register a setting.
    ///
    /// Insertion is insert-if-absent: the first registrant wins for both
    /// exact keys and group prefixes, and a duplicate registration is a
    /// silent no-op.
    ///
    /// # Errors
    /// `ScopeMismatch` if the setting belongs to another scope, or
    /// `InvalidKey` if its key fails the grammar for its kind.
    pub fn register(&mut self, setting: Setting) -> Result<()> {
        if setting.scope() != self.scope {
            return Err(Error::scope_mismatch(
                setting.key(),
                self.scope,
                setting.scope(),
            ));
        }
        setting.validate_key()?;
        if setting.is_group() {
            if !self.group_settings.iter().any(|s| s.key() == setting.key()) {
                self.group_settings.push(setting);
            }
        } else {
            self.key_settings
                .entry(setting.key().to_string())
                .or_insert(setting);
        }
        Ok(())
    }

    /// Resolve a concrete key to its setting: exact match first, then a
    /// linear scan of group matchers in registration order.
    pub fn resolve(&self, key: &str) -> Option<&Setting> {
        self.key_settings
            .get(key)
            .or_else(|| self.group_settings.iter().find(|s| s.matches(key)))
    }

    /// Whether the key resolves to a dynamically updateable setting.
    /// Unresolved keys are not dynamic.
    pub fn is_dynamic(&self, key: &str) -> bool {
        self.resolve(key).is_some_and(Setting::is_dynamic)
    }

    /// Validate a proposed value for a key.
    ///
    /// # Errors
    /// `UnknownSetting` if the key does not resolve, or the resolved
    /// setting's validator error.
    pub fn validate(&self, key: &str, value: &str) -> Result<()> {
        let setting = self.resolve(key).ok_or_else(|| Error::unknown_setting(key))?;
        setting.validate_value(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn resolve_returns_registered_setting() {
        let mut registry = SettingRegistry::new(Scope::Cluster);
        registry
            .register(Setting::leaf("a.b", Scope::Cluster).dynamic())
            .unwrap();
        let resolved = registry.resolve("a.b").unwrap();
        assert_eq!(resolved.key(), "a.b");
        assert!(registry.is_dynamic("a.b"));
    }

    #[test]
    fn resolve_group_match_for_keys_under_prefix() {
        let mut registry = SettingRegistry::new(Scope::Index);
        registry
            .register(Setting::group("routing.", Scope::Index))
            .unwrap();
        let resolved = registry.resolve("routing.allocation.total").unwrap();
        assert_eq!(resolved.key(), "routing.");
        assert!(registry.resolve("other.key").is_none());
    }

    #[test]
    fn exact_match_wins_over_group_matcher() {
        let mut registry = SettingRegistry::new(Scope::Cluster);
        registry.register(Setting::group("a.", Scope::Cluster)).unwrap();
        registry
            .register(Setting::leaf("a.b", Scope::Cluster).dynamic())
            .unwrap();
        let resolved = registry.resolve("a.b").unwrap();
        assert_eq!(resolved.key(), "a.b");
        assert!(resolved.is_dynamic());
    }

    #[test]
    fn register_rejects_scope_mismatch() {
        let mut registry = SettingRegistry::new(Scope::Cluster);
        let err = registry
            .register(Setting::leaf("a.b", Scope::Index))
            .unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch { .. }));
    }

    #[test]
    fn register_rejects_bad_key_grammar() {
        let mut registry = SettingRegistry::new(Scope::Cluster);
        assert!(matches!(
            registry.register(Setting::leaf("a.", Scope::Cluster)),
            Err(Error::InvalidKey { .. })
        ));
        assert!(matches!(
            registry.register(Setting::group("a.b", Scope::Cluster)),
            Err(Error::InvalidKey { .. })
        ));
    }

    #[test]
    fn first_registrant_wins() {
        let mut registry = SettingRegistry::new(Scope::Cluster);
        registry
            .register(Setting::leaf("a.b", Scope::Cluster).dynamic())
            .unwrap();
        registry.register(Setting::leaf("a.b", Scope::Cluster)).unwrap();
        assert!(registry.is_dynamic("a.b"));
    }

    #[test]
    fn unresolved_keys_are_not_dynamic() {
        let registry = SettingRegistry::new(Scope::Cluster);
        assert!(!registry.is_dynamic("no.such.key"));
        assert!(matches!(
            registry.validate("no.such.key", "1"),
            Err(Error::UnknownSetting { .. })
        ));
    }
}
