//! Setting descriptors: key grammar, scope, mutability, and validators.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::{Error, Result};

/// Leaf setting keys: dot-segmented words, ending in a word segment.
pub const LEAF_KEY_PATTERN: &str = r"^(?:[-\w]+[.])*[-\w]+$";

/// Group setting keys: one or more word segments, each ending in a dot.
pub const GROUP_KEY_PATTERN: &str = r"^(?:[-\w]+[.])+$";

#[allow(clippy::expect_used)]
static LEAF_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LEAF_KEY_PATTERN).expect("hardcoded regex pattern is valid"));

#[allow(clippy::expect_used)]
static GROUP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GROUP_KEY_PATTERN).expect("hardcoded regex pattern is valid"));

/// The scope a setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Cluster-wide settings.
    Cluster,
    /// Per-resource (index) settings.
    Index,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cluster => write!(f, "cluster"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Whether a setting names one concrete key or a key group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Exactly one concrete key.
    Leaf,
    /// A dot-terminated prefix matching every key underneath it.
    Group,
}

/// Value validator run before a proposed value is accepted.
pub type Validator = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// A registered configuration key: its grammar kind, scope, mutability,
/// and optional value validator.
///
/// Settings are registered once at bootstrap and immutable thereafter.
#[derive(Clone)]
pub struct Setting {
    key: String,
    scope: Scope,
    kind: SettingKind,
    dynamic: bool,
    validator: Option<Validator>,
}

impl std::fmt::Debug for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setting")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("dynamic", &self.dynamic)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Setting {
    /// Define a leaf setting for one concrete key.
    pub fn leaf(key: impl Into<String>, scope: Scope) -> Self {
        Self {
            key: key.into(),
            scope,
            kind: SettingKind::Leaf,
            dynamic: false,
            validator: None,
        }
    }

    /// Define a group setting owning every key under a dot-terminated prefix.
    pub fn group(prefix: impl Into<String>, scope: Scope) -> Self {
        Self {
            key: prefix.into(),
            scope,
            kind: SettingKind::Group,
            dynamic: false,
            validator: None,
        }
    }

    /// Mark the setting as dynamically updateable at runtime.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Attach a value validator.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// The setting's key (leaf key or group prefix).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The scope this setting belongs to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Leaf or group.
    pub fn kind(&self) -> SettingKind {
        self.kind
    }

    /// Whether the setting may change at runtime.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Whether this is a group setting.
    pub fn is_group(&self) -> bool {
        self.kind == SettingKind::Group
    }

    /// Group-matcher predicate: does this setting own the given concrete key?
    /// Always false for leaf settings (those resolve by exact match instead).
    pub fn matches(&self, key: &str) -> bool {
        self.is_group() && key.starts_with(&self.key)
    }

    /// Validate the setting's own key against the grammar for its kind.
    pub fn validate_key(&self) -> Result<()> {
        match self.kind {
            SettingKind::Leaf if LEAF_KEY.is_match(&self.key) => Ok(()),
            SettingKind::Group if GROUP_KEY.is_match(&self.key) => Ok(()),
            SettingKind::Leaf => Err(Error::invalid_key(&self.key, LEAF_KEY_PATTERN)),
            SettingKind::Group => Err(Error::invalid_key(&self.key, GROUP_KEY_PATTERN)),
        }
    }

    /// Run the validator, if any, against a proposed value.
    pub fn validate_value(&self, value: &str) -> Result<()> {
        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
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
    fn leaf_key_grammar() {
        for key in ["a", "a.b", "foo.bar-baz", "a.b.c_d", "-x.y"] {
            assert!(
                Setting::leaf(key, Scope::Cluster).validate_key().is_ok(),
                "expected '{key}' to be a valid leaf key"
            );
        }
        for key in ["", "a.", ".a", "a..b", "a b", "a.*"] {
            assert!(
                Setting::leaf(key, Scope::Cluster).validate_key().is_err(),
                "expected '{key}' to be rejected as a leaf key"
            );
        }
    }

    #[test]
    fn group_key_grammar() {
        for key in ["a.", "a.b.", "foo-bar."] {
            assert!(
                Setting::group(key, Scope::Cluster).validate_key().is_ok(),
                "expected '{key}' to be a valid group key"
            );
        }
        for key in ["", "a", "a.b", ".a.", "a..", "a.*."] {
            assert!(
                Setting::group(key, Scope::Cluster).validate_key().is_err(),
                "expected '{key}' to be rejected as a group key"
            );
        }
    }

    #[test]
    fn group_matcher_owns_keys_under_prefix() {
        let group = Setting::group("a.", Scope::Cluster);
        assert!(group.matches("a.b"));
        assert!(group.matches("a.b.c"));
        assert!(!group.matches("ab"));
        assert!(!group.matches("b.a"));

        let leaf = Setting::leaf("a.b", Scope::Cluster);
        assert!(!leaf.matches("a.b"));
    }

    #[test]
    fn validator_rejects_bad_values() {
        let setting = Setting::leaf("x.count", Scope::Cluster).with_validator(|value| {
            value
                .parse::<u64>()
                .map(|_| ())
                .map_err(|e| Error::invalid_value("x.count", e.to_string()))
        });
        assert!(setting.validate_value("42").is_ok());
        assert!(setting.validate_value("many").is_err());
    }
}
