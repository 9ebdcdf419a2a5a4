use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub start_index: usize,

    /// Inclusive.
    pub end_index: usize,

    #[serde(default)]
    pub processed: bool,
}

impl BatchEntry {
    pub fn item_count(&self) -> usize {
        self.end_index + 1 - self.start_index
    }
}

/// Batches keyed by id; iteration order is processing order.
///
/// The plan is a value: stages take it and hand back an updated copy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct BatchPlan {
    /// Row stride used to map `(batch_id, local_index)` back to a global row.
    pub batch_size: usize,

    pub batches: BTreeMap<usize, BatchEntry>,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, batch_id: usize) -> Option<&BatchEntry> {
        self.batches.get(&batch_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BatchEntry)> {
        self.batches.iter().map(|(id, b)| (*id, b))
    }

    /// Returns the plan with `batch_id` marked processed. Unknown ids are ignored.
    pub fn with_processed(mut self, batch_id: usize) -> Self {
        if let Some(entry) = self.batches.get_mut(&batch_id) {
            entry.processed = true;
        }
        self
    }

    pub fn processed_ids(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, b)| b.processed)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn pending_ids(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, b)| !b.processed)
            .map(|(id, _)| id)
            .collect()
    }
}

/// Row position in the source table of `local_index` inside batch `batch_id`.
pub fn global_index(batch_size: usize, batch_id: usize, local_index: usize) -> usize {
    batch_id * batch_size + local_index
}
