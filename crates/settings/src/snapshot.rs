//! Immutable settings snapshots, builders, and proposed-change patches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An immutable key-to-string settings snapshot.
///
/// Snapshots are never mutated in place. New snapshots are produced through
/// [`SettingsBuilder`] or [`Settings::merge`], and reconciliation always
/// compares two snapshots (current vs. previous) rather than inspecting a
/// single mutable map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    map: BTreeMap<String, String>,
}

impl Settings {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a snapshot.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Get the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Iterate over all key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Merge another snapshot over this one, producing a new snapshot.
    /// Keys in `other` win over keys in `self`.
    pub fn merge(&self, other: &Settings) -> Settings {
        let mut map = self.map.clone();
        for (key, value) in &other.map {
            map.insert(key.clone(), value.clone());
        }
        Settings { map }
    }

    /// Convert back into a builder for further edits.
    pub fn to_builder(&self) -> SettingsBuilder {
        SettingsBuilder {
            map: self.map.clone(),
        }
    }
}

/// Mutable builder for [`Settings`] snapshots. Later `put` wins.
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    map: BTreeMap<String, String>,
}

impl SettingsBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a key/value pair, replacing any existing value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.map.insert(key.into(), value.into());
        self
    }

    /// Remove a key. Absent keys are ignored.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.map.remove(key);
        self
    }

    /// Get the current staged value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Check whether a key is staged.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Keys currently staged, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of staged keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Put every key/value pair from a snapshot. Later put wins.
    pub fn put_all(&mut self, settings: &Settings) -> &mut Self {
        for (key, value) in settings.iter() {
            self.map.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Finish building, producing an immutable snapshot.
    pub fn build(self) -> Settings {
        Settings { map: self.map }
    }
}

/// A proposed settings delta. A key mapped to `None` marks deletion;
/// delete keys may carry `*` wildcards, expanded against the target's
/// current key set at application time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    map: BTreeMap<String, Option<String>>,
}

impl SettingsPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put for a key.
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map.insert(key.into(), Some(value.into()));
        self
    }

    /// Stage a deletion for a key or `*` wildcard pattern.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.map.insert(key.into(), None);
        self
    }

    /// Iterate over staged entries. `None` values are deletions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Whether the patch stages nothing.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Simple `*` wildcard match. `*` matches any run of characters, including
/// an empty one; everything else matches literally.
pub fn simple_match(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((prefix, remainder)) => {
            if !text.starts_with(prefix) {
                return false;
            }
            let Some(tail) = text.get(prefix.len()..) else {
                return false;
            };
            if remainder.is_empty() {
                return true;
            }
            (0..=tail.len())
                .any(|idx| tail.get(idx..).is_some_and(|rest| simple_match(remainder, rest)))
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
    fn merge_later_put_wins() {
        let mut base = Settings::builder();
        base.put("a", "1").put("b", "2");
        let base = base.build();

        let mut over = Settings::builder();
        over.put("b", "3").put("c", "4");
        let over = over.build();

        let merged = base.merge(&over);
        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("3"));
        assert_eq!(merged.get("c"), Some("4"));
        // inputs untouched
        assert_eq!(base.get("b"), Some("2"));
    }

    #[test]
    fn builder_roundtrip_and_remove() {
        let mut builder = Settings::builder();
        builder.put("x.y", "1").put("x.z", "2").remove("x.y");
        let settings = builder.build();
        assert!(!settings.contains("x.y"));
        assert_eq!(settings.get("x.z"), Some("2"));
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn patch_distinguishes_puts_from_deletes() {
        let patch = SettingsPatch::new().put("a", "1").delete("b.*");
        let entries: Vec<_> = patch.iter().collect();
        assert_eq!(entries, vec![("a", Some("1")), ("b.*", None)]);
    }

    #[test]
    fn simple_match_literal_and_wildcard() {
        assert!(simple_match("foo.bar", "foo.bar"));
        assert!(!simple_match("foo.bar", "foo.baz"));
        assert!(simple_match("foo.*", "foo.bar"));
        assert!(simple_match("foo.*", "foo."));
        assert!(!simple_match("foo.*", "fo"));
        assert!(simple_match("*", "anything"));
        assert!(simple_match("a*c", "abc"));
        assert!(simple_match("a*c", "ac"));
        assert!(!simple_match("a*c", "ab"));
        assert!(simple_match("a*b*c", "axxbyyc"));
    }

    #[test]
    fn snapshot_serde_is_transparent() {
        let mut builder = Settings::builder();
        builder.put("a.b", "1");
        let settings = builder.build();
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"a.b":"1"}"#);
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
