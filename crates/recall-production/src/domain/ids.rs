//! Production ID generation
//!
//! Each ProductionSystem owns its generator, so independent instances never
//! share a counter.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of production IDs
pub trait IdGenerator: Send + Sync {
    /// Next unique ID, prefixed (`prod`, `chunk`)
    fn next_id(&self, prefix: &str) -> String;
}

/// Monotonic counter: `prod-1`, `prod-2`, `chunk-3`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", prefix, n)
    }
}

/// Time-ordered UUIDs (v7)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::now_v7())
    }
}
