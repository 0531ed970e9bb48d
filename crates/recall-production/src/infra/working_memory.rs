//! Working Memory
//!
//! The fact store read by production conditions and written by actions.

use parking_lot::RwLock;
use recall_common::{NotFoundError, Result, ValidationError, WorkingMemoryItem};

/// Trait for working-memory backends
pub trait WorkingMemory: Send + Sync {
    /// Snapshot of every item, in insertion order
    fn get_all(&self) -> Vec<WorkingMemoryItem>;

    /// Add an item; IDs are unique
    fn add(&self, item: WorkingMemoryItem) -> Result<()>;

    /// Remove an item by ID
    fn remove(&self, id: &str) -> Result<WorkingMemoryItem>;

    /// Get an item by ID
    fn get(&self, id: &str) -> Option<WorkingMemoryItem>;

    /// Replace an existing item with the same ID
    fn update(&self, item: WorkingMemoryItem) -> Result<()> {
        self.remove(&item.id)?;
        self.add(item)
    }
}

/// In-memory working memory
#[derive(Debug, Default)]
pub struct InMemoryWorkingMemory {
    items: RwLock<Vec<WorkingMemoryItem>>,
}

impl InMemoryWorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl WorkingMemory for InMemoryWorkingMemory {
    fn get_all(&self) -> Vec<WorkingMemoryItem> {
        self.items.read().clone()
    }

    fn add(&self, item: WorkingMemoryItem) -> Result<()> {
        let mut items = self.items.write();
        if items.iter().any(|i| i.id == item.id) {
            return Err(ValidationError::DuplicateId(item.id).into());
        }
        items.push(item);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<WorkingMemoryItem> {
        let mut items = self.items.write();
        let pos = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| NotFoundError::WorkingMemoryItem(id.to_string()))?;
        Ok(items.remove(pos))
    }

    fn get(&self, id: &str) -> Option<WorkingMemoryItem> {
        self.items.read().iter().find(|i| i.id == id).cloned()
    }

    /// Replaces in place, keeping the item's position
    fn update(&self, item: WorkingMemoryItem) -> Result<()> {
        let mut items = self.items.write();
        let slot = items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| NotFoundError::WorkingMemoryItem(item.id.clone()))?;
        *slot = item;
        Ok(())
    }
}
