//! Refraction
//!
//! A production that fired against an exact set of items may not fire
//! against that same set again until the refraction set is cleared.

use std::collections::HashSet;

/// (production, sorted matched-item IDs)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefractionKey {
    production_id: String,
    items: Vec<String>,
}

impl RefractionKey {
    pub fn new(production_id: &str, items: &[String]) -> Self {
        let mut items = items.to_vec();
        items.sort();
        items.dedup();
        Self {
            production_id: production_id.to_string(),
            items,
        }
    }

    pub fn production_id(&self) -> &str {
        &self.production_id
    }
}

/// Keys of combinations that already fired
#[derive(Debug)]
pub struct RefractionSet {
    keys: HashSet<RefractionKey>,
    enabled: bool,
}

impl RefractionSet {
    pub fn new(enabled: bool) -> Self {
        Self {
            keys: HashSet::new(),
            enabled,
        }
    }

    /// Record a firing; recorded even while disabled
    pub fn mark(&mut self, key: RefractionKey) {
        self.keys.insert(key);
    }

    /// Whether the combination is blocked
    pub fn blocks(&self, key: &RefractionKey) -> bool {
        self.enabled && self.keys.contains(key)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Forget every key of a production
    pub fn purge(&mut self, production_id: &str) {
        self.keys.retain(|k| k.production_id != production_id);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
