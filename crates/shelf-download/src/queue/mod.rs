//! Global download queue.
//!
//! This module provides a pure state machine for the ordered, deduplicated
//! queue of items waiting for the single transfer slot. No I/O is performed
//! here; the scheduler handles I/O.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - At most one entry per item id
//! - Head first: `pop_front` hands out the next item to schedule

mod types;

use indexmap::IndexMap;

use shelf_core::download::ItemId;

pub use types::QueueEntry;

/// Ordered queue of items waiting to be scheduled.
///
/// No internal locking; the scheduler keeps it inside its state mutex.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    pending: IndexMap<ItemId, QueueEntry>,
}

impl DownloadQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of pending entries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if an item is currently queued.
    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.pending.contains_key(item_id)
    }

    /// Append an entry at the back.
    ///
    /// Returns `false` (and leaves the queue untouched) if the item is
    /// already queued.
    pub fn push(&mut self, entry: QueueEntry) -> bool {
        if self.contains(&entry.item_id) {
            return false;
        }
        self.pending.insert(entry.item_id.clone(), entry);
        true
    }

    /// Put an entry back at the head, e.g. when its schedule had to be deferred.
    ///
    /// An existing entry for the same item is moved to the head.
    pub fn push_front(&mut self, entry: QueueEntry) {
        self.pending.shift_remove(&entry.item_id);
        self.pending.shift_insert(0, entry.item_id.clone(), entry);
    }

    /// Pop the next entry from the front of the queue.
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.pending.shift_remove_index(0).map(|(_, entry)| entry)
    }

    /// Remove an item, preserving the order of the rest.
    pub fn remove(&mut self, item_id: &ItemId) -> Option<QueueEntry> {
        self.pending.shift_remove(item_id)
    }

    /// Remove every entry, returning them head first.
    pub fn drain_all(&mut self) -> Vec<QueueEntry> {
        self.pending.drain(..).map(|(_, entry)| entry).collect()
    }

    /// Queued item ids, head first.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.pending.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry::new(ItemId::new(id), None, None)
    }

    #[test]
    fn test_push_single() {
        let mut queue = DownloadQueue::new();
        assert!(queue.push(entry("a")));

        assert!(queue.contains(&ItemId::new("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_push_is_idempotent() {
        let mut queue = DownloadQueue::new();
        assert!(queue.push(entry("book1")));
        assert!(!queue.push(entry("book1")));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.item_ids(), vec![ItemId::new("book1")]);
    }

    #[test]
    fn test_pop_front_fifo() {
        let mut queue = DownloadQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));

        assert_eq!(queue.pop_front().unwrap().item_id.as_str(), "a");
        assert_eq!(queue.pop_front().unwrap().item_id.as_str(), "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_push_front_moves_existing_entry() {
        let mut queue = DownloadQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));
        queue.push(entry("c"));

        queue.push_front(entry("c"));

        let ids: Vec<_> = queue.item_ids().into_iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut queue = DownloadQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));
        queue.push(entry("c"));

        assert!(queue.remove(&ItemId::new("b")).is_some());
        assert!(queue.remove(&ItemId::new("b")).is_none());

        let ids: Vec<_> = queue.item_ids().into_iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_drain_all_empties_queue() {
        let mut queue = DownloadQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
