//! Source-to-destination id mapping for entities referenced by other entities.

use std::collections::HashMap;

/// Maps source milestone ids to the ids of their re-created destination copies.
///
/// Scoped to a single project migration and dropped with it; never persisted.
#[derive(Debug, Default)]
pub struct IdRemapTable {
    milestones: HashMap<u64, u64>,
}

impl IdRemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_milestone(&mut self, source_id: u64, dest_id: u64) {
        self.milestones.insert(source_id, dest_id);
    }

    /// Destination id for a source milestone. Never returns the source id itself.
    pub fn milestone(&self, source_id: u64) -> Option<u64> {
        self.milestones.get(&source_id).copied()
    }

    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }
}
