//! Firing History
//!
//! Bounded FIFO of firing records; the oldest record is evicted first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::matching::Bindings;

/// One production firing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringRecord {
    pub production_id: String,
    pub timestamp: DateTime<Utc>,
    /// Every action succeeded
    pub success: bool,
    pub matched_items: Vec<String>,
    pub bindings: Bindings,
    /// Current goal when the production fired
    pub goal_id: Option<String>,
}

#[derive(Debug)]
pub struct FiringHistory {
    records: VecDeque<FiringRecord>,
    capacity: usize,
}

impl FiringHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, record: FiringRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Oldest first
    pub fn records(&self) -> Vec<FiringRecord> {
        self.records.iter().cloned().collect()
    }

    /// Production IDs of the last `n` successful firings, oldest first
    pub fn recent_successful(&self, n: usize) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.success)
            .take(n)
            .map(|r| r.production_id.clone())
            .collect();
        ids.reverse();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
