//! # Recall Retrieval
//!
//! Sub-linear recall of past task experiences for a fleet of agents.
//!
//! Experiences are indexed three ways: exact hash maps (agent, tier, task
//! signature), random-hyperplane LSH buckets, and a hierarchical navigable
//! small-world graph. A Bloom filter screens task signatures that were never
//! seen before the exact map is consulted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SubLinearRetriever                     │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐      │
//! │  │   Exact     │  │  Semantic   │  │  Attribute  │      │
//! │  │ (signature) │  │ (embedding) │  │  (filters)  │      │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘      │
//! │         │                │                │             │
//! │  ┌──────┴──────┐  ┌──────┴──────┐  ┌──────┴──────┐      │
//! │  │ BloomFilter │  │ LshIndex +  │  │ ExactIndex  │      │
//! │  │ ExactIndex  │  │ HnswGraph   │  │             │      │
//! │  └─────────────┘  └─────────────┘  └─────────────┘      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All state sits behind one `parking_lot::RwLock`: reads share it, mutations
//! take it exclusively.

pub mod config;
pub mod domain;

/// Embedding dimension used when none is configured
pub const DEFAULT_DIMENSION: usize = 384;

/// Result count used when a query asks for 0
pub const DEFAULT_TOP_K: usize = 10;

pub use config::{BloomSettings, HnswSettings, LshSettings, RetrieverConfig};
pub use domain::bloom::BloomFilter;
pub use domain::experience::{ExperienceTuple, ExperienceTupleBuilder};
pub use domain::hnsw::HnswGraph;
pub use domain::indexing::{ExactIndex, IndexStats, Scope};
pub use domain::lsh::LshIndex;
pub use domain::retrieval::{
    QueryContext, RetrievalMethod, RetrievalResult, RetrievedExperience, RetrieverStats,
    SubLinearRetriever,
};
