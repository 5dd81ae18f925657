//! Queue DTOs for API responses and snapshots.
//!
//! These types are "UI safe" - Clone + Debug + Serialize + Deserialize with no
//! infrastructure dependencies.

use serde::{Deserialize, Serialize};

use super::types::ItemId;

/// Summary of the global download queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Number of entries waiting in the queue.
    pub length: usize,
    /// Queued item ids, head first.
    pub items: Vec<ItemId>,
    /// Whether a transfer is being scheduled or is in flight.
    pub is_processing: bool,
    /// Item ids excluded from scheduling.
    pub blocked: Vec<ItemId>,
}

impl QueueStatus {
    /// Check if the queue is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether an item is waiting in the queue.
    #[must_use]
    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.contains(item_id)
    }

    /// Whether an item is blocked.
    #[must_use]
    pub fn is_blocked(&self, item_id: &ItemId) -> bool {
        self.blocked.contains(item_id)
    }
}
