//! Chain listener.
//!
//! One long-lived task consumes every engine update. Progress and active
//! statuses only refresh the live cache; a completed track triggers a
//! debounced reconcile that either chains the next track or declares the
//! item complete. Failures are terminal for the item.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use shelf_core::download::{DownloadError, ItemId, TaskStatus, TaskUpdate};

use super::DownloadSchedulerImpl;
use super::scheduler::{RejectReason, ScheduleOutcome};
use crate::adapter::{ItemEvent, ItemEventKind, owner_of, to_item_event};
use crate::queue::QueueEntry;
use crate::state::{ItemPhase, ItemTransition};

/// What reconcile decided after looking at the item.
enum Decision {
    /// Nothing to do beyond publishing.
    Settle,
    /// Only a fresh live flag holds the item; look again after this long.
    Recheck(Duration),
    /// The item has no active work; scan its tracks.
    Scan,
}

impl DownloadSchedulerImpl {
    /// Consume engine updates until shutdown or until the engine goes away.
    pub(super) async fn listen(self: Arc<Self>, mut updates: broadcast::Receiver<TaskUpdate>) {
        loop {
            let received = tokio::select! {
                () = self.shutdown.cancelled() => break,
                received = updates.recv() => received,
            };

            match received {
                Ok(update) => self.handle_update(update).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        target: "shelf.download",
                        skipped,
                        "Listener lagged behind engine updates"
                    );
                    self.recover_after_lag().await;
                }
                Err(RecvError::Closed) => {
                    tracing::info!(target: "shelf.download", "Engine update stream closed");
                    break;
                }
            }
        }

        tracing::debug!(target: "shelf.download", "Listener stopped");
    }

    /// Re-decide every in-flight item; a dropped `Complete` would
    /// otherwise hold the slot forever.
    async fn recover_after_lag(self: &Arc<Self>) {
        let in_flight: Vec<ItemId> = {
            let state = self.state.lock().await;
            state
                .items
                .iter()
                .filter(|(_, entry)| entry.phase == ItemPhase::InFlight && !entry.chaining)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for item_id in in_flight {
            tracing::debug!(target: "shelf.download", item = %item_id, "Reconciling after lag");
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.reconcile(&item_id).await;
            });
        }
        self.drain_notify.notify_one();
    }

    async fn handle_update(self: &Arc<Self>, update: TaskUpdate) {
        let Some(event) = to_item_event(update) else {
            tracing::trace!(target: "shelf.download", "Ignoring update without owner");
            return;
        };

        if self.registry.is_blocked(&event.item_id).await {
            self.handle_blocked_event(&event).await;
            return;
        }

        let now = Instant::now();
        let mut reconcile = false;
        let mut failure = None;
        let mut publish = true;
        {
            let mut state = self.state.lock().await;
            let tracked = state.items.get_mut(&event.item_id).filter(|entry| {
                entry.phase.is_activated() && entry.task_ids.contains(&event.task_id)
            });
            let Some(entry) = tracked else {
                tracing::trace!(
                    target: "shelf.download",
                    item = %event.item_id,
                    task = %event.task_id,
                    "Ignoring update for inactive item"
                );
                if matches!(event.kind, ItemEventKind::Status(s) if s.is_terminal()) {
                    // The slot may have been held by this task.
                    self.drain_notify.notify_one();
                }
                return;
            };

            match event.kind {
                ItemEventKind::Progress(fraction) => {
                    entry.live.record_progress(fraction, now);
                    publish = entry.throttle.should_emit(now);
                }
                ItemEventKind::Status(status) => {
                    entry.live.record_status(status.is_active(), now);
                    entry.throttle.reset();
                    if status.is_terminal() {
                        // Later updates of this task must not touch the next one.
                        entry.task_ids.remove(&event.task_id);
                    }
                    match status {
                        TaskStatus::Enqueued | TaskStatus::Running => {}
                        TaskStatus::Complete => {
                            if entry
                                .active_task
                                .as_ref()
                                .is_some_and(|(id, _)| *id == event.task_id)
                            {
                                entry.active_task = None;
                            }
                            reconcile = true;
                        }
                        TaskStatus::Failed | TaskStatus::Canceled => {
                            failure = Some(status);
                        }
                    }
                }
            }
        }

        if let Some(status) = failure {
            tracing::debug!(
                target: "shelf.download",
                item = %event.item_id,
                task = %event.task_id,
                status = %status,
                "Transfer ended without completing"
            );
            let error = DownloadError::transfer_failed(
                event.item_id.as_str(),
                event.track_index.unwrap_or_default(),
            );
            self.fail_item(&event.item_id, &error).await;
            return;
        }

        if reconcile {
            let scheduler = Arc::clone(self);
            let item_id = event.item_id.clone();
            tokio::spawn(async move {
                scheduler.reconcile(&item_id).await;
            });
        }

        if publish {
            self.publish(&event.item_id).await;
        }
    }

    /// Late events of a canceled item: stop the task and forget its record.
    async fn handle_blocked_event(&self, event: &ItemEvent) {
        tracing::debug!(
            target: "shelf.download",
            item = %event.item_id,
            task = %event.task_id,
            "Discarding task of blocked item"
        );
        self.discard_task(&event.task_id).await;
        if event.is_status() {
            self.drain_notify.notify_one();
        }
    }

    /// Decide what follows a finished track.
    pub(super) async fn reconcile(&self, item_id: &ItemId) {
        if !self.sleep(self.config.debounce).await {
            return;
        }

        loop {
            match self.decide(item_id).await {
                Decision::Settle => {
                    self.publish(item_id).await;
                    return;
                }
                Decision::Recheck(wait) => {
                    if !self.sleep(wait).await {
                        return;
                    }
                }
                Decision::Scan => break,
            }
        }

        self.chain(item_id).await;
    }

    async fn decide(&self, item_id: &ItemId) -> Decision {
        if self.registry.is_blocked(item_id).await {
            return Decision::Settle;
        }

        let records = self.records_or_empty().await;
        let durable_active = records
            .iter()
            .any(|r| r.status.is_active() && owner_of(&r.task).as_ref() == Some(item_id));

        let now = Instant::now();
        let stale_after = self.config.stale_after;
        let mut state = self.state.lock().await;
        let Some(entry) = state.items.get_mut(item_id) else {
            return Decision::Settle;
        };
        if !entry.phase.is_activated() || entry.chaining || durable_active {
            return Decision::Settle;
        }

        if entry.live.is_running() {
            if entry.live.is_stale(now, stale_after) {
                tracing::debug!(target: "shelf.download", item = %item_id, "Clearing stale live flag");
                entry.live.clear();
            } else {
                // Wake just after the flag would turn stale.
                return Decision::Recheck(stale_after + Duration::from_millis(1));
            }
        }

        match entry.phase.transition(ItemTransition::TrackFinished) {
            Ok(_) => {
                entry.active_task = None;
                entry.chaining = true;
                Decision::Scan
            }
            // Already queued between tracks, or a schedule is pending.
            Err(_) => Decision::Settle,
        }
    }

    /// Scan tracks against files and schedule the next one.
    async fn chain(&self, item_id: &ItemId) {
        let (episode_id, title) = {
            let state = self.state.lock().await;
            match state.items.get(item_id) {
                Some(entry) => (entry.episode_id.clone(), entry.title.clone()),
                None => return,
            }
        };

        let tracks = match self.track_source.get_tracks(item_id, episode_id.clone()).await {
            Ok(mut tracks) => {
                tracks.sort_by_key(|t| t.index);
                self.state
                    .lock()
                    .await
                    .tracks
                    .insert(item_id.clone(), tracks.clone());
                Some(tracks)
            }
            Err(e) => {
                tracing::warn!(target: "shelf.download", item = %item_id, error = %e, "Track listing failed, using cache");
                self.state.lock().await.tracks.get(item_id).cloned()
            }
        };

        let Some(tracks) = tracks else {
            // Let the runner retry through the regular path.
            self.requeue_front(item_id).await;
            return;
        };

        if self.probe.first_missing(item_id, &tracks).is_none() {
            self.finish_item(item_id).await;
            return;
        }

        let wait = {
            let mut state = self.state.lock().await;
            let halted = state.halt.is_active(Instant::now());
            let other_in_flight = state.slot_busy(Some(item_id));
            if halted || other_in_flight {
                drop(state);
                tracing::debug!(
                    target: "shelf.download",
                    item = %item_id,
                    halted,
                    other_in_flight,
                    "Deferring next track"
                );
                self.requeue_front(item_id).await;
                return;
            }
            state
                .items
                .get(item_id)
                .map_or(Duration::ZERO, |entry| entry.gate.wait_remaining(Instant::now()))
        };

        if !self.sleep(wait).await {
            return;
        }

        let entry = QueueEntry::new(item_id.clone(), episode_id, Some(title));
        let outcome = self.schedule_next(&entry).await;
        tracing::debug!(target: "shelf.download", item = %item_id, outcome = ?outcome, "Chained");

        {
            let mut state = self.state.lock().await;
            if let Some(item) = state.items.get_mut(item_id) {
                item.chaining = false;
            }
        }

        match outcome {
            ScheduleOutcome::Complete => self.finish_item(item_id).await,
            ScheduleOutcome::Rejected(RejectReason::SlotBusy) => self.requeue_front(item_id).await,
            ScheduleOutcome::Submitted { .. } | ScheduleOutcome::AlreadyActive => {}
            ScheduleOutcome::Rejected(_) | ScheduleOutcome::Failed(_) => {
                self.publish(item_id).await;
                self.drain_notify.notify_one();
            }
        }
    }

    /// Put an item back at the head of the queue and wake the runner.
    async fn requeue_front(&self, item_id: &ItemId) {
        {
            let mut state = self.state.lock().await;
            let Some(entry) = state.items.get_mut(item_id) else {
                return;
            };
            entry.chaining = false;
            if !entry.phase.is_activated() {
                return;
            }
            let queue_entry = entry.queue_entry(item_id);
            state.queue.push_front(queue_entry);
        }

        self.publish(item_id).await;
        self.emit_queue_changed().await;
        self.drain_notify.notify_one();
    }
}
