//! Working memory items
//!
//! The facts a production system matches its conditions against. Working
//! memory itself is an external collaborator; this is the item shape it
//! exchanges with the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single working-memory element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryItem {
    /// Unique item identifier
    pub id: String,

    /// Free-form content (text, serialized payload, ...)
    pub content: String,

    /// Content type tag (e.g. "goal_check", "observation")
    pub content_type: String,

    /// Activation level, decays/boosts are the owner's business
    pub activation: f64,

    /// Salience used by attention-style consumers
    pub salience: f64,

    /// Arbitrary structured metadata
    pub metadata: Map<String, Value>,

    /// When the item was created
    pub created_at: DateTime<Utc>,
}

impl WorkingMemoryItem {
    /// Create an item with a fresh UUID
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), content_type, content)
    }

    /// Create an item with an explicit ID
    pub fn with_id(
        id: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            content_type: content_type.into(),
            activation: 1.0,
            salience: 0.5,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn activation(mut self, activation: f64) -> Self {
        self.activation = activation;
        self
    }

    pub fn salience(mut self, salience: f64) -> Self {
        self.salience = salience;
        self
    }

    /// Attach a metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
