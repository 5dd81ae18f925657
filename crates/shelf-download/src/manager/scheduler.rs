//! Queue runner and per-item scheduling.
//!
//! `schedule_next` submits at most one task: the first track of the item
//! that is not on disk. The runner pops one queue entry at a time and stops
//! as soon as something occupies the transfer slot.

use std::sync::atomic::Ordering;

use tokio::time::Instant;

use shelf_core::download::{DownloadError, DownloadEvent, ItemId};

use super::{DownloadSchedulerImpl, TrackDestination};
use crate::adapter::{describe_track, new_task_id, owner_of};
use crate::queue::QueueEntry;
use crate::state::{ItemPhase, ItemTransition};

/// Why a schedule attempt did not submit anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The item is in the blocked registry or was canceled meanwhile.
    Blocked,
    /// Another attempt for the same item is running.
    AlreadyScheduling,
    /// Another item holds the transfer slot.
    SlotBusy,
    /// The item is not waiting to be scheduled.
    NotQueued,
}

/// Result of one `schedule_next` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// One task was handed to the engine.
    Submitted { task_id: String, track_index: u32 },
    /// The engine already runs a task for the item; it was adopted.
    AlreadyActive,
    /// Every track is on disk.
    Complete,
    /// Nothing was submitted.
    Rejected(RejectReason),
    /// The attempt failed; the item is now `Failed`.
    Failed(DownloadError),
}

impl DownloadSchedulerImpl {
    /// The main runner loop.
    ///
    /// Waits on `drain_notify`, sits out an active halt window, then drains.
    pub(super) async fn run_loop(&self) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = self.drain_notify.notified() => {}
            }

            loop {
                let remaining = self.state.lock().await.halt.remaining(Instant::now());
                match remaining {
                    Some(wait) => {
                        tracing::debug!(target: "shelf.download", wait = ?wait, "Queue halted");
                        if !self.sleep(wait).await {
                            return;
                        }
                    }
                    None => break,
                }
            }

            self.draining.store(true, Ordering::SeqCst);
            self.drain().await;
            self.draining.store(false, Ordering::SeqCst);
            self.emit_queue_changed().await;
        }

        tracing::debug!(target: "shelf.download", "Runner stopped");
    }

    /// Pop queue entries until one occupies the slot or the queue is empty.
    async fn drain(&self) {
        loop {
            {
                let state = self.state.lock().await;
                if state.halt.is_active(Instant::now()) {
                    // Wake again so the runner sits out the window.
                    self.drain_notify.notify_one();
                    return;
                }
                if state.queue.is_empty() || state.slot_busy(None) {
                    return;
                }
            }

            if !self.sleep(self.config.settle_delay).await {
                return;
            }

            let records = self.records_or_empty().await;
            if records.iter().any(|r| r.status.is_active()) {
                tracing::debug!(target: "shelf.download", "Engine busy, drain deferred");
                return;
            }

            let Some(entry) = self.state.lock().await.queue.pop_front() else {
                return;
            };

            let item_id = entry.item_id.clone();
            let outcome = self.schedule_next(&entry).await;
            tracing::debug!(
                target: "shelf.download",
                item = %item_id,
                waited = ?entry.queued_at.elapsed(),
                outcome = ?outcome,
                "Drained entry"
            );

            match outcome {
                ScheduleOutcome::Complete => self.finish_item(&item_id).await,
                ScheduleOutcome::Rejected(RejectReason::SlotBusy) => {
                    self.state.lock().await.queue.push_front(entry);
                    return;
                }
                ScheduleOutcome::Submitted { .. } | ScheduleOutcome::AlreadyActive => return,
                ScheduleOutcome::Rejected(_) | ScheduleOutcome::Failed(_) => {}
            }
        }
    }

    /// Submit one task for the first missing track of `entry`.
    pub(super) async fn schedule_next(&self, entry: &QueueEntry) -> ScheduleOutcome {
        let item_id = &entry.item_id;

        if self.registry.is_blocked(item_id).await {
            return ScheduleOutcome::Rejected(RejectReason::Blocked);
        }

        // Claim the slot.
        {
            let mut state = self.state.lock().await;
            let slot_busy = state.slot_busy(Some(item_id));
            let Some(item) = state.items.get_mut(item_id) else {
                return ScheduleOutcome::Rejected(RejectReason::NotQueued);
            };
            match item.phase {
                ItemPhase::Scheduling => {
                    return ScheduleOutcome::Rejected(RejectReason::AlreadyScheduling);
                }
                ItemPhase::InFlight => return ScheduleOutcome::Rejected(RejectReason::SlotBusy),
                ItemPhase::Blocked => return ScheduleOutcome::Rejected(RejectReason::Blocked),
                _ => {}
            }
            if slot_busy {
                return ScheduleOutcome::Rejected(RejectReason::SlotBusy);
            }
            if item.phase.transition(ItemTransition::BeginSchedule).is_err() {
                return ScheduleOutcome::Rejected(RejectReason::NotQueued);
            }
            item.gate.mark(Instant::now());
        }

        // Re-check against durable records.
        let records = match self.engine.all_records().await {
            Ok(records) => records,
            Err(e) => {
                let error = DownloadError::engine(e.to_string());
                self.fail_item(item_id, &error).await;
                return ScheduleOutcome::Failed(error);
            }
        };
        let mine: Vec<String> = records
            .iter()
            .filter(|r| r.status.is_active() && owner_of(&r.task).as_ref() == Some(item_id))
            .map(|r| r.task_id().to_string())
            .collect();
        if !mine.is_empty() {
            self.adopt_tasks(item_id, mine).await;
            return ScheduleOutcome::AlreadyActive;
        }
        if records.iter().any(|r| r.status.is_active()) {
            self.reject_schedule(item_id).await;
            return ScheduleOutcome::Rejected(RejectReason::SlotBusy);
        }

        let tracks = match self
            .track_source
            .get_tracks(item_id, entry.episode_id.clone())
            .await
        {
            Ok(mut tracks) if !tracks.is_empty() => {
                tracks.sort_by_key(|t| t.index);
                self.state
                    .lock()
                    .await
                    .tracks
                    .insert(item_id.clone(), tracks.clone());
                tracks
            }
            Ok(_) => {
                let error = DownloadError::track_source(item_id.as_str(), "item has no tracks");
                self.fail_item(item_id, &error).await;
                return ScheduleOutcome::Failed(error);
            }
            Err(e) => {
                let error = DownloadError::track_source(item_id.as_str(), e.to_string());
                self.fail_item(item_id, &error).await;
                return ScheduleOutcome::Failed(error);
            }
        };

        let Some(track) = self.probe.first_missing(item_id, &tracks).cloned() else {
            return ScheduleOutcome::Complete;
        };

        let requires_wifi = match self.preferences.get_bool(&self.config.wifi_only_key).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!(target: "shelf.download", error = %e, "Failed to read Wi-Fi preference");
                false
            }
        };

        let destination = TrackDestination::plan(&self.probe, item_id, &track);
        if let Err(e) = destination.ensure_dir() {
            self.fail_item(item_id, &e).await;
            return ScheduleOutcome::Failed(e);
        }

        let task_id = new_task_id();
        let task = match describe_track(
            task_id.clone(),
            item_id,
            &track,
            destination.item_dir.clone(),
            requires_wifi,
        ) {
            Ok(task) => task,
            Err(e) => {
                self.fail_item(item_id, &e).await;
                return ScheduleOutcome::Failed(e);
            }
        };

        // Mark in flight before submitting so early events find their task.
        let title = {
            let mut state = self.state.lock().await;
            let Some(item) = state.items.get_mut(item_id) else {
                return ScheduleOutcome::Rejected(RejectReason::NotQueued);
            };
            if item.phase.transition(ItemTransition::Submitted).is_err() {
                // Canceled while we were looking at tracks.
                return ScheduleOutcome::Rejected(RejectReason::Blocked);
            }
            item.task_ids.insert(task_id.clone());
            item.active_task = Some((task_id.clone(), destination.path()));
            item.grace_until = Some(Instant::now() + self.config.queued_grace);
            let first = !item.started_notified;
            item.started_notified = true;
            first.then(|| item.title.clone())
        };

        if let Err(e) = self.engine.enqueue(task).await {
            let error = DownloadError::engine(e.to_string());
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.items.get_mut(item_id) {
                    item.task_ids.remove(&task_id);
                }
            }
            self.fail_item(item_id, &error).await;
            return ScheduleOutcome::Failed(error);
        }

        let canceled_meanwhile = self.registry.is_blocked(item_id).await
            || self
                .state
                .lock()
                .await
                .items
                .get(item_id)
                .is_none_or(|item| item.phase == ItemPhase::Blocked);
        if canceled_meanwhile {
            tracing::debug!(target: "shelf.download", item = %item_id, task = %task_id, "Canceled during submit");
            self.discard_task(&task_id).await;
            return ScheduleOutcome::Rejected(RejectReason::Blocked);
        }

        tracing::info!(
            target: "shelf.download",
            item = %item_id,
            track = track.index,
            task = %task_id,
            wifi_only = requires_wifi,
            "Submitted track"
        );

        if let Some(title) = title {
            self.notifier.on_download_started(&title);
            self.event_emitter
                .emit(DownloadEvent::started(item_id.clone(), title));
        }
        self.publish(item_id).await;

        ScheduleOutcome::Submitted {
            task_id,
            track_index: track.index,
        }
    }

    /// Take over tasks the engine already runs for the item.
    async fn adopt_tasks(&self, item_id: &ItemId, task_ids: Vec<String>) {
        tracing::debug!(target: "shelf.download", item = %item_id, tasks = task_ids.len(), "Adopting running tasks");
        let mut state = self.state.lock().await;
        if let Some(item) = state.items.get_mut(item_id) {
            if item.phase.transition(ItemTransition::Submitted).is_ok() {
                item.task_ids.extend(task_ids);
                item.grace_until = Some(Instant::now() + self.config.queued_grace);
                item.started_notified = true;
            }
        }
    }

    /// Give the claimed slot back and leave the item queued.
    async fn reject_schedule(&self, item_id: &ItemId) {
        let mut state = self.state.lock().await;
        if let Some(item) = state.items.get_mut(item_id) {
            let _ = item.phase.transition(ItemTransition::ScheduleRejected);
        }
    }

    /// Best-effort cancel and record removal of a single task.
    pub(super) async fn discard_task(&self, task_id: &str) {
        if let Err(e) = self.engine.cancel_by_ids(&[task_id.to_string()]).await {
            tracing::warn!(target: "shelf.download", task = task_id, error = %e, "Failed to cancel task");
        }
        if let Err(e) = self.engine.delete_record(task_id).await {
            tracing::warn!(target: "shelf.download", task = task_id, error = %e, "Failed to delete record");
        }
    }
}
