//! Blocked-item registry.
//!
//! Items the user canceled are blocked so late engine events cannot chain
//! them again. The set is persisted as a string list preference and
//! survives restarts; enqueueing an item unblocks it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use shelf_core::download::ItemId;
use shelf_core::ports::PreferenceStorePort;

/// Persisted set of blocked item ids.
pub struct BlockedItemRegistry {
    prefs: Arc<dyn PreferenceStorePort>,
    key: String,
    items: Mutex<BTreeSet<ItemId>>,
}

impl BlockedItemRegistry {
    /// Load the registry from preferences.
    ///
    /// A failing store yields an empty registry; the failure is logged.
    pub async fn load(prefs: Arc<dyn PreferenceStorePort>, key: impl Into<String>) -> Self {
        let key = key.into();
        let items = match prefs.get_string_list(&key).await {
            Ok(values) => values
                .into_iter()
                .map(ItemId::from)
                .filter(|id| !id.is_blank())
                .collect(),
            Err(e) => {
                tracing::warn!(
                    target: "shelf.download",
                    key = %key,
                    error = %e,
                    "Failed to load blocked items, starting empty"
                );
                BTreeSet::new()
            }
        };

        tracing::debug!(target: "shelf.download", count = items.len(), "Loaded blocked items");

        Self {
            prefs,
            key,
            items: Mutex::new(items),
        }
    }

    pub async fn is_blocked(&self, item_id: &ItemId) -> bool {
        self.items.lock().await.contains(item_id)
    }

    /// Block an item. Returns `true` if it was not blocked before.
    pub async fn block(&self, item_id: &ItemId) -> bool {
        self.block_many(std::slice::from_ref(item_id)).await > 0
    }

    /// Block several items with a single write. Returns how many were new.
    pub async fn block_many(&self, item_ids: &[ItemId]) -> usize {
        let mut items = self.items.lock().await;
        let added = item_ids
            .iter()
            .filter(|id| items.insert((*id).clone()))
            .count();
        if added > 0 {
            self.persist(&items).await;
        }
        added
    }

    /// Unblock an item. Returns `true` if it was blocked.
    pub async fn unblock(&self, item_id: &ItemId) -> bool {
        let mut items = self.items.lock().await;
        let removed = items.remove(item_id);
        if removed {
            self.persist(&items).await;
        }
        removed
    }

    /// Current blocked ids, sorted.
    pub async fn snapshot(&self) -> Vec<ItemId> {
        self.items.lock().await.iter().cloned().collect()
    }

    async fn persist(&self, items: &BTreeSet<ItemId>) {
        let values: Vec<String> = items.iter().map(ToString::to_string).collect();
        if let Err(e) = self.prefs.set_string_list(&self.key, &values).await {
            tracing::warn!(
                target: "shelf.download",
                key = %self.key,
                error = %e,
                "Failed to persist blocked items"
            );
        }
    }
}
