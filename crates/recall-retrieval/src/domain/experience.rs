//! Experience records
//!
//! An experience is the trace of one completed task: who ran it, at which
//! tier, what the task looked like, what was produced and how well it went,
//! plus an embedding used for semantic recall.

use chrono::{DateTime, Utc};
use recall_common::{Result, ValidationError};
use serde::{Deserialize, Serialize};

/// A completed task trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceTuple {
    /// Unique experience identifier
    pub id: String,

    /// Agent that produced the experience
    pub agent_id: String,

    /// Tier the agent was operating at
    pub tier_id: u32,

    /// Normalized task signature used for exact matching
    pub task_signature: String,

    /// Task input
    pub input: String,

    /// Produced output
    pub output: String,

    /// Strategy description that was applied
    pub strategy: String,

    /// Whether the task succeeded
    pub success: bool,

    /// Fitness of the outcome, higher is better
    pub fitness_score: f64,

    /// Fixed-dimension embedding
    pub embedding: Vec<f32>,

    /// When the experience was recorded
    pub timestamp: DateTime<Utc>,
}

impl ExperienceTuple {
    /// Create a builder
    pub fn builder(id: impl Into<String>, agent_id: impl Into<String>) -> ExperienceTupleBuilder {
        ExperienceTupleBuilder::new(id, agent_id)
    }
}

/// Builder for ExperienceTuple
#[derive(Debug)]
pub struct ExperienceTupleBuilder {
    id: String,
    agent_id: String,
    tier_id: u32,
    task_signature: String,
    input: String,
    output: String,
    strategy: String,
    success: bool,
    fitness_score: f64,
    embedding: Option<Vec<f32>>,
    timestamp: Option<DateTime<Utc>>,
}

impl ExperienceTupleBuilder {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            tier_id: 0,
            task_signature: String::new(),
            input: String::new(),
            output: String::new(),
            strategy: String::new(),
            success: false,
            fitness_score: 0.0,
            embedding: None,
            timestamp: None,
        }
    }

    pub fn tier(mut self, tier_id: u32) -> Self {
        self.tier_id = tier_id;
        self
    }

    pub fn task_signature(mut self, signature: impl Into<String>) -> Self {
        self.task_signature = signature.into();
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Record the outcome
    pub fn outcome(mut self, success: bool, fitness_score: f64) -> Self {
        self.success = success;
        self.fitness_score = fitness_score;
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the ExperienceTuple
    pub fn build(self) -> Result<ExperienceTuple> {
        let embedding = self
            .embedding
            .ok_or(ValidationError::MissingField("embedding"))?;

        Ok(ExperienceTuple {
            id: self.id,
            agent_id: self.agent_id,
            tier_id: self.tier_id,
            task_signature: self.task_signature,
            input: self.input,
            output: self.output,
            strategy: self.strategy,
            success: self.success,
            fitness_score: self.fitness_score,
            embedding,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}
