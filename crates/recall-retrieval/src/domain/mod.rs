//! Retrieval domain logic
//!
//! Probabilistic and approximate indices plus the retriever that combines them.

pub mod bloom;
pub mod experience;
pub mod hnsw;
pub mod indexing;
pub mod lsh;
pub mod retrieval;
pub mod vector;
