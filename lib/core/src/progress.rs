//! Per-batch progress, counted in chunk pairs

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Chunk pairs completed out of the batch total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Receiver of blocking progress
pub trait ProgressSink: Sync {
    fn set_total(&self, total: usize);
    fn advance(&self);
}

/// Sink that drops every update
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&self, _total: usize) {}
    fn advance(&self) {}
}

/// Per-batch progress shared between the matching worker and any number
/// of pollers. Each batch has its own slot, so concurrent batches do not
/// clobber each other.
#[derive(Clone, Default)]
pub struct ProgressRegistry {
    slots: Arc<RwLock<HashMap<String, Progress>>>,
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the slot of a batch at `0 / 0` and hand out its writer
    pub fn start(&self, batch_id: &str) -> ProgressHandle {
        self.slots
            .write()
            .insert(batch_id.to_string(), Progress::default());
        ProgressHandle {
            batch_id: batch_id.to_string(),
            slots: self.slots.clone(),
        }
    }

    #[inline]
    pub fn get(&self, batch_id: &str) -> Option<Progress> {
        self.slots.read().get(batch_id).copied()
    }

    pub fn remove(&self, batch_id: &str) -> Option<Progress> {
        self.slots.write().remove(batch_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

/// Writer side of one batch slot. Updates only ever move forward.
pub struct ProgressHandle {
    batch_id: String,
    slots: Arc<RwLock<HashMap<String, Progress>>>,
}

impl ProgressHandle {
    #[inline]
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Mark the batch done, `current == total`
    pub fn finish(&self) {
        if let Some(slot) = self.slots.write().get_mut(&self.batch_id) {
            slot.current = slot.total;
        }
    }
}

impl ProgressSink for ProgressHandle {
    fn set_total(&self, total: usize) {
        if let Some(slot) = self.slots.write().get_mut(&self.batch_id) {
            slot.total = slot.total.max(total);
            slot.current = slot.current.min(slot.total);
        }
    }

    fn advance(&self) {
        if let Some(slot) = self.slots.write().get_mut(&self.batch_id) {
            if slot.current < slot.total {
                slot.current += 1;
            }
        }
    }
}
