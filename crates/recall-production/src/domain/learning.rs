//! Chunk Learning
//!
//! Compresses a sequence of productions into one: the first production's
//! conditions with the last production's actions. Productions in between
//! contribute nothing.

use chrono::Utc;

use super::production::{Production, ProductionSource};

/// Priority given to every learned chunk
pub const CHUNK_PRIORITY: f64 = 0.5;

/// Build a chunk from a non-empty sequence; returns `None` when empty
///
/// The chunk has no ID yet; the system assigns one when it is added.
pub fn synthesize_chunk(name: &str, sequence: &[&Production]) -> Option<Production> {
    let first = sequence.first()?;
    let last = sequence.last()?;

    Some(Production {
        id: String::new(),
        name: name.to_string(),
        conditions: first.conditions.clone(),
        actions: last.actions.clone(),
        priority: CHUNK_PRIORITY,
        specificity: first.conditions.len(),
        enabled: true,
        fire_count: 0,
        success_count: 0,
        created_at: Utc::now(),
        last_fired: None,
        source: ProductionSource::Learned,
    })
}
