//! Production system configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::conflict::ConflictStrategy;

/// ProductionSystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Maximum number of productions held at once
    pub max_productions: usize,
    /// Firing records kept before the oldest is evicted
    pub max_history: usize,
    /// Shortest sequence accepted by chunk learning
    pub min_chunk_length: usize,
    /// Whether chunk learning is enabled
    pub learning_enabled: bool,
    /// Whether refraction filters the conflict set
    pub refraction_enabled: bool,
    /// Conflict-resolution strategies, most significant first
    pub strategies: Vec<ConflictStrategy>,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            max_productions: 10_000,
            max_history: 1_000,
            min_chunk_length: 2,
            learning_enabled: true,
            refraction_enabled: true,
            strategies: ConflictStrategy::default_order(),
        }
    }
}

impl ProductionConfig {
    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Some(v) = env_parse("RECALL_PRODUCTION_MAX_PRODUCTIONS") {
            cfg.max_productions = v;
        }
        if let Some(v) = env_parse("RECALL_PRODUCTION_MAX_HISTORY") {
            cfg.max_history = v;
        }
        if let Some(v) = env_parse("RECALL_PRODUCTION_MIN_CHUNK_LENGTH") {
            cfg.min_chunk_length = v;
        }
        if let Some(v) = env_parse("RECALL_PRODUCTION_LEARNING_ENABLED") {
            cfg.learning_enabled = v;
        }
        if let Some(v) = env_parse("RECALL_PRODUCTION_REFRACTION_ENABLED") {
            cfg.refraction_enabled = v;
        }
        if let Ok(list) = std::env::var("RECALL_PRODUCTION_STRATEGIES") {
            cfg.strategies = ConflictStrategy::parse_list(&list)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_productions == 0 {
            bail!("max_productions must be positive");
        }
        if self.max_history == 0 {
            bail!("max_history must be positive");
        }
        if self.min_chunk_length == 0 {
            bail!("min_chunk_length must be positive");
        }
        if self.strategies.is_empty() {
            bail!("at least one conflict-resolution strategy is required");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
