use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    action_space::{ActionName, ActionSignature},
    world_model::types::{NodeKey, Observation},
};

/// Session-lifetime memo tables. No entry ever expires.
#[derive(Debug, Clone, Default)]
pub struct WorldCaches {
    action_safety: HashMap<(NodeKey, ActionSignature), bool>,
    effective_states: HashMap<Observation, NodeKey>,
    always_safe: BTreeSet<ActionName>,
    analyzed: BTreeSet<ActionName>,
    param_ranges: BTreeMap<ActionName, Option<String>>,
}

impl WorldCaches {
    pub fn action_safety(&self, state: &str, action: &ActionSignature) -> Option<bool> {
        // Keyed by owned tuples; lookups clone the pair once.
        self.action_safety
            .get(&(state.to_string(), action.clone()))
            .copied()
    }

    pub fn store_action_safety(&mut self, state: &str, action: ActionSignature, is_safe: bool) {
        self.action_safety
            .insert((state.to_string(), action), is_safe);
    }

    pub fn effective_state(&self, observation: &str) -> Option<&NodeKey> {
        self.effective_states.get(observation)
    }

    pub fn store_effective_state(&mut self, observation: &str, state: &str) {
        self.effective_states
            .insert(observation.to_string(), state.to_string());
    }

    pub fn is_analyzed(&self, action: &str) -> bool {
        self.analyzed.contains(action)
    }

    pub fn mark_analyzed(&mut self, action: &str) {
        self.analyzed.insert(action.to_string());
    }

    pub fn is_always_safe(&self, action: &str) -> bool {
        self.always_safe.contains(action)
    }

    pub fn mark_always_safe(&mut self, action: &str) {
        self.analyzed.insert(action.to_string());
        self.always_safe.insert(action.to_string());
    }

    /// `None` when no range was ever stored, `Some(None)` when the range is known to be
    /// unconstrained.
    pub fn param_range(&self, action: &str) -> Option<Option<&str>> {
        self.param_ranges.get(action).map(Option::as_deref)
    }

    pub fn store_param_range(&mut self, action: &str, range: Option<String>) {
        let range = range.filter(|range| !range.trim().is_empty());
        self.param_ranges.insert(action.to_string(), range);
    }

    pub fn always_safe_actions(&self) -> &BTreeSet<ActionName> {
        &self.always_safe
    }

    pub fn analyzed_actions(&self) -> &BTreeSet<ActionName> {
        &self.analyzed
    }

    pub fn action_safety_len(&self) -> usize {
        self.action_safety.len()
    }

    pub fn effective_state_len(&self) -> usize {
        self.effective_states.len()
    }
}
