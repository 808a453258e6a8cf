//! Registry of the ordered step lists for each named policy.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::step::{Step, StepKey};

struct PolicySteps {
    order: Vec<StepKey>,
    steps: HashMap<StepKey, Step>,
}

/// Maps policy names to their ordered step lists.
///
/// Policies are rebuilt wholesale on change: [`StepRegistry::set_policy_steps`]
/// replaces, never patches. Step keys must be unique within a policy —
/// later duplicates are a registry-construction bug, not a runtime error
/// (checked with `debug_assert!` only; first insert wins).
#[derive(Default)]
pub struct StepRegistry {
    policies: HashMap<String, PolicySteps>,
}

impl StepRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ordered step list for a policy.
    pub fn set_policy_steps(&mut self, policy: impl Into<String>, steps: Vec<Step>) {
        let policy = policy.into();
        let mut order = Vec::with_capacity(steps.len());
        let mut by_key = HashMap::with_capacity(steps.len());
        for step in steps {
            let key = step.key().clone();
            debug_assert!(
                !by_key.contains_key(&key),
                "duplicate step key '{key}' in policy '{policy}'"
            );
            by_key.entry(key.clone()).or_insert(step);
            order.push(key);
        }
        debug!(policy = %policy, steps = order.len(), "replacing policy steps");
        self.policies.insert(
            policy,
            PolicySteps {
                order,
                steps: by_key,
            },
        );
    }

    /// Drop a policy's steps entirely.
    pub fn remove_policy(&mut self, policy: &str) {
        self.policies.remove(policy);
    }

    /// Whether steps are registered for the policy.
    pub fn has_policy(&self, policy: &str) -> bool {
        self.policies.contains_key(policy)
    }

    /// The first step of a policy.
    ///
    /// # Errors
    /// `PolicyNotFound` when the policy has no registered steps.
    pub fn first_step(&self, policy: &str) -> Result<Step> {
        let steps = self
            .policies
            .get(policy)
            .ok_or_else(|| Error::policy_not_found(policy))?;
        steps
            .order
            .first()
            .and_then(|key| steps.steps.get(key))
            .cloned()
            .ok_or_else(|| Error::policy_not_found(policy))
    }

    /// The step at the given key within a policy.
    ///
    /// # Errors
    /// `PolicyNotFound` for an unregistered policy, `StepNotFound` when
    /// the policy defines no step at that key.
    pub fn step(&self, policy: &str, key: &StepKey) -> Result<Step> {
        let steps = self
            .policies
            .get(policy)
            .ok_or_else(|| Error::policy_not_found(policy))?;
        steps
            .steps
            .get(key)
            .cloned()
            .ok_or_else(|| Error::step_not_found(policy, key))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::step::StepKind;

    fn linear_policy(keys: &[StepKey]) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut iter = keys.iter().peekable();
        while let Some(key) = iter.next() {
            match iter.peek() {
                Some(next) => steps.push(Step::new(
                    key.clone(),
                    Some((*next).clone()),
                    StepKind::Terminal,
                )),
                None => steps.push(Step::terminal(key.clone())),
            }
        }
        steps
    }

    #[test]
    fn first_and_keyed_lookup() {
        let keys = [
            StepKey::new("hot", "rollover", "check"),
            StepKey::new("hot", "rollover", "do"),
        ];
        let mut registry = StepRegistry::new();
        registry.set_policy_steps("p1", linear_policy(&keys));

        assert_eq!(registry.first_step("p1").unwrap().key(), &keys[0]);
        assert_eq!(registry.step("p1", &keys[1]).unwrap().key(), &keys[1]);
    }

    #[test]
    fn missing_policy_and_step_are_errors() {
        let mut registry = StepRegistry::new();
        assert!(matches!(
            registry.first_step("nope"),
            Err(Error::PolicyNotFound { .. })
        ));

        registry.set_policy_steps("p1", linear_policy(&[StepKey::new("a", "b", "c")]));
        assert!(matches!(
            registry.step("p1", &StepKey::new("x", "y", "z")),
            Err(Error::StepNotFound { .. })
        ));
    }

    #[test]
    fn set_policy_steps_replaces_wholesale() {
        let mut registry = StepRegistry::new();
        let old_key = StepKey::new("old", "old", "old");
        registry.set_policy_steps("p1", linear_policy(&[old_key.clone()]));

        let new_key = StepKey::new("new", "new", "new");
        registry.set_policy_steps("p1", linear_policy(&[new_key.clone()]));

        assert!(registry.step("p1", &old_key).is_err());
        assert_eq!(registry.first_step("p1").unwrap().key(), &new_key);
    }

    #[test]
    fn remove_policy_forgets_steps() {
        let mut registry = StepRegistry::new();
        registry.set_policy_steps("p1", linear_policy(&[StepKey::new("a", "b", "c")]));
        registry.remove_policy("p1");
        assert!(!registry.has_policy("p1"));
    }
}
