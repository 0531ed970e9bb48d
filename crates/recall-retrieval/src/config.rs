//! Retriever configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// SubLinearRetriever configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Embedding dimension, fixed for the retriever's lifetime
    pub dimension: usize,
    /// Default top-k when a query asks for 0
    pub default_top_k: usize,
    /// HNSW over-fetch factor for semantic queries (k × factor)
    pub semantic_overfetch: usize,
    /// Seed for LSH hyperplanes and HNSW levels
    pub seed: u64,
    /// LSH configuration
    pub lsh: LshSettings,
    /// HNSW configuration
    pub hnsw: HnswSettings,
    /// Task-signature Bloom filter configuration
    pub bloom: BloomSettings,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            dimension: crate::DEFAULT_DIMENSION,
            default_top_k: crate::DEFAULT_TOP_K,
            semantic_overfetch: 4,
            seed: 0x5EED,
            lsh: LshSettings::default(),
            hnsw: HnswSettings::default(),
            bloom: BloomSettings::default(),
        }
    }
}

impl RetrieverConfig {
    /// Default configuration for a given embedding dimension
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Some(v) = env_parse("RECALL_RETRIEVER_DIMENSION") {
            cfg.dimension = v;
        }
        if let Some(v) = env_parse("RECALL_RETRIEVER_DEFAULT_TOP_K") {
            cfg.default_top_k = v;
        }
        if let Some(v) = env_parse("RECALL_RETRIEVER_SEMANTIC_OVERFETCH") {
            cfg.semantic_overfetch = v;
        }
        if let Some(v) = env_parse("RECALL_RETRIEVER_SEED") {
            cfg.seed = v;
        }

        // LSH settings
        if let Some(v) = env_parse("RECALL_LSH_TABLES") {
            cfg.lsh.num_tables = v;
        }
        if let Some(v) = env_parse("RECALL_LSH_HASH_WIDTH") {
            cfg.lsh.hash_width = v;
        }

        // HNSW settings
        if let Some(v) = env_parse("RECALL_HNSW_M") {
            cfg.hnsw.m = v;
        }
        if let Some(v) = env_parse("RECALL_HNSW_EF_CONSTRUCTION") {
            cfg.hnsw.ef_construction = v;
        }
        if let Some(v) = env_parse("RECALL_HNSW_EF_SEARCH") {
            cfg.hnsw.ef_search = v;
        }

        // Bloom settings
        if let Some(v) = env_parse("RECALL_BLOOM_EXPECTED_ITEMS") {
            cfg.bloom.expected_items = v;
        }
        if let Some(v) = env_parse("RECALL_BLOOM_FALSE_POSITIVE_RATE") {
            cfg.bloom.false_positive_rate = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the indices cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            bail!("dimension must be positive");
        }
        if self.lsh.num_tables == 0 || self.lsh.hash_width == 0 || self.lsh.hash_width > 64 {
            bail!(
                "LSH needs at least one table and a hash width in 1..=64, got {} tables of width {}",
                self.lsh.num_tables,
                self.lsh.hash_width
            );
        }
        if self.hnsw.m < 2 {
            bail!("HNSW M must be at least 2, got {}", self.hnsw.m);
        }
        if !(self.bloom.false_positive_rate > 0.0 && self.bloom.false_positive_rate < 1.0) {
            bail!(
                "Bloom false positive rate must be in (0, 1), got {}",
                self.bloom.false_positive_rate
            );
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// LSH settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshSettings {
    /// Number of independent hash tables (L)
    pub num_tables: usize,
    /// Hyperplanes per table (bits per bucket key)
    pub hash_width: usize,
}

impl Default for LshSettings {
    fn default() -> Self {
        Self {
            num_tables: 8,
            hash_width: 12,
        }
    }
}

/// HNSW settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswSettings {
    /// Max neighbors per upper layer (layer 0 keeps 2M)
    pub m: usize,
    /// Insertion beam width
    pub ef_construction: usize,
    /// Query beam width
    pub ef_search: usize,
}

impl Default for HnswSettings {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// Bloom filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomSettings {
    /// Expected number of distinct task signatures
    pub expected_items: usize,
    /// Target false-positive rate
    pub false_positive_rate: f64,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            expected_items: 10_000,
            false_positive_rate: 0.01,
        }
    }
}
