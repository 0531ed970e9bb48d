//! Productions
//!
//! A production is a condition → action rule with usage counters that feed
//! conflict resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::condition::Condition;

/// Where a production came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductionSource {
    Authored,
    /// Synthesized by chunk learning
    Learned,
}

/// A condition → action rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    /// Unique identifier; assigned on add when empty
    pub id: String,
    pub name: String,
    /// Conjunctive left-hand side
    pub conditions: Vec<Condition>,
    /// Ordered right-hand side
    pub actions: Vec<Action>,
    pub priority: f64,
    /// Condition count, fixed when the production is added
    pub specificity: usize,
    pub enabled: bool,
    pub fire_count: u64,
    /// Firings where every action succeeded
    pub success_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_fired: Option<DateTime<Utc>>,
    pub source: ProductionSource,
}

impl Production {
    /// Create an enabled, authored production with no ID yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            priority: 0.5,
            specificity: 0,
            enabled: true,
            fire_count: 0,
            success_count: 0,
            created_at: Utc::now(),
            last_fired: None,
            source: ProductionSource::Authored,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Fraction of firings that succeeded, if ever fired
    pub fn success_rate(&self) -> Option<f64> {
        if self.fire_count == 0 {
            None
        } else {
            Some(self.success_count as f64 / self.fire_count as f64)
        }
    }

    pub fn is_learned(&self) -> bool {
        self.source == ProductionSource::Learned
    }
}
