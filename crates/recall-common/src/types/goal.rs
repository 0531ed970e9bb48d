//! Goals held on the external goal stack

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Goal lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Active,
    Completed,
}

/// A goal pushed by a production or by the orchestration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique goal identifier
    pub id: String,
    /// What the goal is about
    pub description: String,
    /// Relative importance
    pub priority: f64,
    /// Current status
    pub status: GoalStatus,
    /// When the goal was created
    pub created_at: DateTime<Utc>,
    /// When the goal was completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// Create an active goal with a fresh UUID
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), description)
    }

    /// Create an active goal with an explicit ID
    pub fn with_id(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority: 0.5,
            status: GoalStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the goal completed
    pub fn complete(&mut self) {
        self.status = GoalStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }
}
