//! Queue item types (internal implementation).
//!
//! These types are used internally by the queue state machine.
//! For API responses, use `shelf_core::download::QueueStatus`.

use std::time::Instant;

use shelf_core::download::ItemId;

/// An item waiting for the transfer slot.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    /// The item to download.
    pub item_id: ItemId,
    /// Specific episode, for podcast items.
    pub episode_id: Option<String>,
    /// Display title for notifications.
    pub title: String,
    /// When this entry was queued (for ordering/debugging).
    pub queued_at: Instant,
}

impl QueueEntry {
    /// Create a new entry. The title falls back to the item id.
    pub fn new(item_id: ItemId, episode_id: Option<String>, title: Option<String>) -> Self {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| item_id.to_string());
        Self {
            item_id,
            episode_id,
            title,
            queued_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_defaults_to_item_id() {
        let entry = QueueEntry::new(ItemId::new("b1"), None, None);
        assert_eq!(entry.title, "b1");

        let blank = QueueEntry::new(ItemId::new("b1"), None, Some("  ".to_string()));
        assert_eq!(blank.title, "b1");
    }

    #[test]
    fn test_keeps_episode() {
        let entry = QueueEntry::new(
            ItemId::new("pod"),
            Some("ep-7".to_string()),
            Some("Episode 7".to_string()),
        );
        assert_eq!(entry.episode_id.as_deref(), Some("ep-7"));
        assert_eq!(entry.title, "Episode 7");
    }
}
