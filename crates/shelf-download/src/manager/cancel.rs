//! Cancellation and deletion.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use tokio::time::Instant;

use shelf_core::download::{DownloadError, DownloadEvent, ItemId, TaskRecord};

use super::DownloadSchedulerImpl;
use crate::adapter::owner_of;
use crate::state::ItemTransition;

/// Task ids that belong to `item_id`.
///
/// A record matches by any of: a task id the scheduler submitted or
/// adopted, the `book-<id>` group, or the item id in its metadata. Tracked
/// ids without a record are included too, since the engine may not have
/// persisted them yet.
pub fn matching_task_ids(
    item_id: &ItemId,
    tracked: &HashSet<String>,
    records: &[TaskRecord],
) -> Vec<String> {
    let group = item_id.group();
    let mut ids: BTreeSet<String> = records
        .iter()
        .filter(|r| {
            tracked.contains(r.task_id())
                || r.task.group == group
                || owner_of(&r.task).as_ref() == Some(item_id)
        })
        .map(|r| r.task_id().to_string())
        .collect();
    ids.extend(tracked.iter().cloned());
    ids.into_iter().collect()
}

impl DownloadSchedulerImpl {
    /// Block an item and stop everything it has going.
    pub(super) async fn cancel_item(&self, item_id: &ItemId) {
        self.registry.block(item_id).await;

        let (tracked, partial, was_active) = {
            let mut state = self.state.lock().await;
            state.halt.start(Instant::now());
            let was_queued = state.queue.remove(item_id).is_some();
            state.tracks.remove(item_id);
            match state.items.get_mut(item_id) {
                Some(entry) => {
                    let was_active = was_queued || entry.phase.is_activated();
                    let _ = entry.phase.transition(ItemTransition::Cancel);
                    let tracked: HashSet<String> = entry.task_ids.drain().collect();
                    let partial = entry.active_task.take().map(|(_, path)| path);
                    entry.clear_run();
                    (tracked, partial, was_active)
                }
                None => (HashSet::new(), None, was_queued),
            }
        };

        let records = self.records_or_empty().await;
        let task_ids = matching_task_ids(item_id, &tracked, &records);
        let mut partials: Vec<PathBuf> = records
            .iter()
            .filter(|r| r.status.is_active() && task_ids.iter().any(|id| id == r.task_id()))
            .map(|r| r.task.destination())
            .collect();
        partials.extend(partial);

        self.cancel_tasks(&task_ids).await;

        for path in &partials {
            self.probe.remove_partial(path);
        }
        let leftovers = self.probe.remove_leftovers(item_id);

        tracing::info!(
            target: "shelf.download",
            item = %item_id,
            tasks = task_ids.len(),
            leftovers,
            "Download canceled"
        );

        if was_active || !task_ids.is_empty() {
            self.notifier.on_download_canceled();
            self.event_emitter.emit(DownloadEvent::canceled(item_id.clone()));
        }

        self.publish(item_id).await;
        self.emit_queue_changed().await;
        self.drain_notify.notify_one();
    }

    /// Cancel an item, then remove its directory.
    pub(super) async fn delete_item(&self, item_id: &ItemId) -> Result<(), DownloadError> {
        self.cancel_item(item_id).await;
        self.probe.remove_item_dir(item_id)?;

        tracing::info!(target: "shelf.download", item = %item_id, "Deleted local files");

        self.publish(item_id).await;
        Ok(())
    }

    /// Clear the queue, block every tracked item and cancel every record.
    pub(super) async fn cancel_everything(&self) {
        let records = self.records_or_empty().await;

        let (mut items, tracked) = {
            let mut state = self.state.lock().await;
            state.halt.start(Instant::now());
            let mut items: Vec<ItemId> = state
                .queue
                .drain_all()
                .into_iter()
                .map(|entry| entry.item_id)
                .collect();
            let mut tracked: HashSet<String> = HashSet::new();
            for (id, entry) in &mut state.items {
                if entry.phase.is_activated() {
                    items.push(id.clone());
                    let _ = entry.phase.transition(ItemTransition::Cancel);
                }
                tracked.extend(entry.task_ids.drain());
                entry.clear_run();
            }
            (items, tracked)
        };

        items.extend(
            records
                .iter()
                .filter(|r| r.status.is_active())
                .filter_map(|r| owner_of(&r.task)),
        );
        items.sort();
        items.dedup();

        self.registry.block_many(&items).await;

        let mut task_ids: BTreeSet<String> =
            records.iter().map(|r| r.task_id().to_string()).collect();
        task_ids.extend(tracked);
        let task_ids: Vec<String> = task_ids.into_iter().collect();
        self.cancel_tasks(&task_ids).await;

        for record in records.iter().filter(|r| r.status.is_active()) {
            self.probe.remove_partial(&record.task.destination());
        }
        for item_id in &items {
            self.probe.remove_leftovers(item_id);
        }

        tracing::info!(
            target: "shelf.download",
            items = items.len(),
            tasks = task_ids.len(),
            "Canceled all downloads"
        );

        if !items.is_empty() {
            self.notifier.on_download_canceled();
        }
        for item_id in &items {
            self.event_emitter.emit(DownloadEvent::canceled(item_id.clone()));
            self.publish(item_id).await;
        }
        self.emit_queue_changed().await;
    }

    /// Cancel tasks in the engine and delete their records, best effort.
    async fn cancel_tasks(&self, task_ids: &[String]) {
        if task_ids.is_empty() {
            return;
        }
        if let Err(e) = self.engine.cancel_by_ids(task_ids).await {
            tracing::warn!(target: "shelf.download", error = %e, "Failed to cancel tasks");
        }
        for task_id in task_ids {
            if let Err(e) = self.engine.delete_record(task_id).await {
                tracing::debug!(target: "shelf.download", task = %task_id, error = %e, "Failed to delete record");
            }
        }
    }
}
