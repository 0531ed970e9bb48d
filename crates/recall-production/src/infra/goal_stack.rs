//! Goal Stack
//!
//! Goals pushed and completed by production actions. The current goal is
//! attributed to every firing record.

use parking_lot::RwLock;
use recall_common::{Goal, NotFoundError, Result, ValidationError};

/// Trait for goal-stack backends
pub trait GoalStack: Send + Sync {
    /// Push a goal; it becomes the current goal
    fn push(&self, goal: Goal) -> Result<()>;

    /// Complete a goal by ID and take it off the stack
    fn complete(&self, id: &str) -> Result<Goal>;

    /// Top-most active goal
    fn current(&self) -> Option<Goal>;
}

/// In-memory goal stack
#[derive(Debug, Default)]
pub struct InMemoryGoalStack {
    goals: RwLock<Vec<Goal>>,
}

impl InMemoryGoalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.goals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.read().is_empty()
    }
}

impl GoalStack for InMemoryGoalStack {
    fn push(&self, goal: Goal) -> Result<()> {
        let mut goals = self.goals.write();
        if goals.iter().any(|g| g.id == goal.id) {
            return Err(ValidationError::DuplicateId(goal.id).into());
        }
        goals.push(goal);
        Ok(())
    }

    fn complete(&self, id: &str) -> Result<Goal> {
        let mut goals = self.goals.write();
        let pos = goals
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| NotFoundError::Goal(id.to_string()))?;
        let mut goal = goals.remove(pos);
        goal.complete();
        Ok(goal)
    }

    fn current(&self) -> Option<Goal> {
        self.goals.read().iter().rev().find(|g| g.is_active()).cloned()
    }
}
