//! Download scheduler implementation.
//!
//! This module provides the concrete implementation of
//! `DownloadSchedulerPort`: one service object that owns the queue, the
//! per-item state and every cache, plus two long-lived tasks.
//!
//! # Architecture
//!
//! - **Scheduler**: owns all mutable state behind one lock
//! - **Runner**: drains the global queue whenever `drain_notify` fires
//! - **Listener**: consumes engine updates and chains the next track
//!
//! # Concurrency Model
//!
//! - One transfer at a time across all items
//! - The slot is claimed under the state lock (`Scheduling` phase) before
//!   any engine call, then re-checked against durable engine records
//! - The state lock is never held across a port call
//! - `Notify` for wake-on-work; the runner is started once and stopped by
//!   the shutdown token

mod cancel;
mod listener;
mod paths;
mod scheduler;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use shelf_core::download::{
    DownloadError, DownloadEvent, ItemId, ItemProgress, QueueStatus, RemoteTrack, TaskRecord,
    TaskStatus,
};
use shelf_core::ports::{
    DownloadEventEmitterPort, DownloadNotifierPort, DownloadSchedulerConfig,
    DownloadSchedulerPort, PreferenceStorePort, TrackSourcePort, TransferEnginePort,
};

use crate::adapter::owner_of;
use crate::probe::LocalFileProbe;
use crate::progress::{ProgressInputs, ProgressThrottle, aggregate};
use crate::queue::{DownloadQueue, QueueEntry};
use crate::registry::BlockedItemRegistry;
use crate::state::{HaltWindow, ItemPhase, ItemTransition, LiveActivity, RescheduleGate};

pub use cancel::matching_task_ids;
pub use paths::TrackDestination;
pub use scheduler::{RejectReason, ScheduleOutcome};

/// Dependencies for creating a download scheduler.
///
/// This struct bundles all the ports and configuration needed
/// to construct a `DownloadSchedulerImpl`.
pub struct DownloadSchedulerDeps {
    /// Executes and persists track transfers.
    pub engine: Arc<dyn TransferEnginePort>,
    /// Lists the remote tracks of an item.
    pub track_source: Arc<dyn TrackSourcePort>,
    /// Holds the blocked-item registry and the Wi-Fi-only flag.
    pub preferences: Arc<dyn PreferenceStorePort>,
    /// User-visible notifications.
    pub notifier: Arc<dyn DownloadNotifierPort>,
    /// Port for emitting download events.
    pub event_emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Configuration for the scheduler.
    pub config: DownloadSchedulerConfig,
}

/// Build a download scheduler from its dependencies.
///
/// Creates the downloads directory, loads the blocked-item registry,
/// subscribes to the engine and starts the runner and listener tasks.
/// Must be called inside a tokio runtime.
pub async fn build_download_scheduler(
    deps: DownloadSchedulerDeps,
) -> Result<Arc<DownloadSchedulerImpl>, DownloadError> {
    shelf_core::paths::prepare_downloads_dir(&deps.config.downloads_directory)?;

    let registry = BlockedItemRegistry::load(
        Arc::clone(&deps.preferences),
        deps.config.blocked_items_key.clone(),
    )
    .await;

    let scheduler = Arc::new(DownloadSchedulerImpl::new(deps, registry));
    scheduler.ensure_runner();

    tracing::info!(
        target: "shelf.download",
        dir = %scheduler.config.downloads_directory.display(),
        "Download scheduler started"
    );

    Ok(scheduler)
}

/// Per-item bookkeeping.
#[derive(Debug)]
struct ItemEntry {
    phase: ItemPhase,
    title: String,
    episode_id: Option<String>,
    /// Every task id submitted or adopted for the current run.
    task_ids: HashSet<String>,
    /// Task currently transferring and where it writes.
    active_task: Option<(String, PathBuf)>,
    live: LiveActivity,
    /// Reports `Running` until this instant.
    grace_until: Option<Instant>,
    gate: RescheduleGate,
    throttle: ProgressThrottle,
    /// A chain step (track finished, next not yet submitted) is running.
    chaining: bool,
    started_notified: bool,
}

impl ItemEntry {
    fn new(item_id: &ItemId, config: &DownloadSchedulerConfig) -> Self {
        Self {
            phase: ItemPhase::Idle,
            title: item_id.to_string(),
            episode_id: None,
            task_ids: HashSet::new(),
            active_task: None,
            live: LiveActivity::default(),
            grace_until: None,
            gate: RescheduleGate::new(config.reschedule_throttle),
            throttle: ProgressThrottle::new(config.progress_interval),
            chaining: false,
            started_notified: false,
        }
    }

    /// Forget everything tied to the current run.
    fn clear_run(&mut self) {
        self.task_ids.clear();
        self.active_task = None;
        self.live.clear();
        self.grace_until = None;
        self.chaining = false;
    }

    fn queue_entry(&self, item_id: &ItemId) -> QueueEntry {
        QueueEntry::new(
            item_id.clone(),
            self.episode_id.clone(),
            Some(self.title.clone()),
        )
    }
}

/// All mutable scheduler state. Guarded by one lock.
struct SchedulerState {
    queue: DownloadQueue,
    items: HashMap<ItemId, ItemEntry>,
    tracks: HashMap<ItemId, Vec<RemoteTrack>>,
    halt: HaltWindow,
    watchers: HashMap<ItemId, watch::Sender<ItemProgress>>,
}

impl SchedulerState {
    /// Whether any item other than `except` holds the transfer slot.
    fn slot_busy(&self, except: Option<&ItemId>) -> bool {
        self.items
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .any(|(_, entry)| entry.phase.is_in_flight() || entry.chaining)
    }
}

/// Concrete implementation of the download scheduler.
///
/// This struct is public but adapters should typically use
/// `Arc<dyn DownloadSchedulerPort>` instead of depending on this type directly.
pub struct DownloadSchedulerImpl {
    engine: Arc<dyn TransferEnginePort>,
    track_source: Arc<dyn TrackSourcePort>,
    preferences: Arc<dyn PreferenceStorePort>,
    notifier: Arc<dyn DownloadNotifierPort>,
    event_emitter: Arc<dyn DownloadEventEmitterPort>,
    config: DownloadSchedulerConfig,
    probe: LocalFileProbe,
    registry: BlockedItemRegistry,
    state: Mutex<SchedulerState>,
    /// Notifier for waking the runner when work is available.
    drain_notify: Notify,
    /// Set while the runner drains.
    draining: AtomicBool,
    /// Whether the runner has been started (never reset).
    runner_started: AtomicBool,
    shutdown: CancellationToken,
}

impl DownloadSchedulerImpl {
    fn new(deps: DownloadSchedulerDeps, registry: BlockedItemRegistry) -> Self {
        let probe = LocalFileProbe::new(deps.config.downloads_directory.clone());
        let halt = HaltWindow::new(deps.config.halt_window);

        Self {
            engine: deps.engine,
            track_source: deps.track_source,
            preferences: deps.preferences,
            notifier: deps.notifier,
            event_emitter: deps.event_emitter,
            config: deps.config,
            probe,
            registry,
            state: Mutex::new(SchedulerState {
                queue: DownloadQueue::new(),
                items: HashMap::new(),
                tracks: HashMap::new(),
                halt,
                watchers: HashMap::new(),
            }),
            drain_notify: Notify::new(),
            draining: AtomicBool::new(false),
            runner_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// The scheduler configuration.
    pub const fn config(&self) -> &DownloadSchedulerConfig {
        &self.config
    }

    /// Ensure the runner and listener are started.
    ///
    /// This method is idempotent: calling it multiple times has no effect
    /// after the first call.
    pub fn ensure_runner(self: &Arc<Self>) {
        if self
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Subscribe before spawning so no update is missed.
            let updates = self.engine.subscribe();

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.run_loop().await;
            });

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.listen(updates).await;
            });
        }
    }

    /// Stop the runner and listener. Pending work stays queued.
    pub fn shutdown(&self) {
        tracing::info!(target: "shelf.download", "Download scheduler shutting down");
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sleep unless shut down first. Returns `false` on shutdown.
    async fn sleep(&self, duration: std::time::Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Durable records, or none when the engine cannot be read.
    async fn records_or_empty(&self) -> Vec<TaskRecord> {
        match self.engine.all_records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(target: "shelf.download", error = %e, "Failed to read task records");
                Vec::new()
            }
        }
    }

    /// Tracks of an item, from cache or the track source.
    ///
    /// Only activated items are cached; the cache is dropped when an item
    /// completes or is canceled.
    async fn tracks_for(
        &self,
        item_id: &ItemId,
        episode_id: Option<String>,
    ) -> Option<Vec<RemoteTrack>> {
        if let Some(tracks) = self.state.lock().await.tracks.get(item_id) {
            return Some(tracks.clone());
        }

        match self.track_source.get_tracks(item_id, episode_id).await {
            Ok(mut tracks) => {
                tracks.sort_by_key(|t| t.index);
                let mut state = self.state.lock().await;
                let activated = state
                    .items
                    .get(item_id)
                    .is_some_and(|entry| entry.phase.is_activated());
                if activated {
                    state.tracks.insert(item_id.clone(), tracks.clone());
                }
                Some(tracks)
            }
            Err(e) => {
                tracing::debug!(
                    target: "shelf.download",
                    item = %item_id,
                    error = %e,
                    "Track listing unavailable"
                );
                None
            }
        }
    }

    /// Queue an item without touching the blocked registry.
    ///
    /// Returns `false` if the item was already queued or in flight.
    async fn enqueue_internal(
        &self,
        item_id: &ItemId,
        episode_id: Option<String>,
        title: Option<String>,
    ) -> bool {
        {
            let mut state = self.state.lock().await;
            let already = state.queue.contains(item_id)
                || state
                    .items
                    .get(item_id)
                    .is_some_and(|entry| entry.phase.is_activated());
            if already {
                tracing::debug!(target: "shelf.download", item = %item_id, "Already queued or in flight");
                return false;
            }

            let config = &self.config;
            let entry = state
                .items
                .entry(item_id.clone())
                .or_insert_with(|| ItemEntry::new(item_id, config));
            if let Err(e) = entry.phase.transition(ItemTransition::Enqueue) {
                tracing::warn!(target: "shelf.download", item = %item_id, error = %e, "Unexpected phase on enqueue");
                return false;
            }
            entry.clear_run();
            entry.started_notified = false;
            entry.grace_until = Some(Instant::now() + self.config.queued_grace);
            if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
                entry.title = title;
            }
            if episode_id.is_some() {
                entry.episode_id = episode_id;
            }
            let queue_entry = entry.queue_entry(item_id);
            state.queue.push(queue_entry);
        }

        self.delete_stale_records(item_id).await;

        tracing::info!(target: "shelf.download", item = %item_id, "Queued for download");

        self.publish(item_id).await;
        self.emit_queue_changed().await;
        self.drain_notify.notify_one();
        true
    }

    /// Drop failed and canceled records so the next attempt starts clean.
    async fn delete_stale_records(&self, item_id: &ItemId) {
        let records = self.records_or_empty().await;
        let stale = records.iter().filter(|r| {
            matches!(r.status, TaskStatus::Failed | TaskStatus::Canceled)
                && owner_of(&r.task).as_ref() == Some(item_id)
        });

        for record in stale {
            if let Err(e) = self.engine.delete_record(record.task_id()).await {
                tracing::warn!(
                    target: "shelf.download",
                    task = record.task_id(),
                    error = %e,
                    "Failed to delete stale record"
                );
            }
        }
    }

    /// Mark an item complete and notify, at most once per run.
    async fn finish_item(&self, item_id: &ItemId) {
        let newly_complete = {
            let mut state = self.state.lock().await;
            state.queue.remove(item_id);
            state.tracks.remove(item_id);
            state.items.get_mut(item_id).and_then(|entry| {
                entry.clear_run();
                entry
                    .phase
                    .transition(ItemTransition::AllTracksPresent)
                    .ok()
                    .map(|_| entry.title.clone())
            })
        };

        if let Some(title) = newly_complete {
            tracing::info!(target: "shelf.download", item = %item_id, "Download complete");
            self.notifier.on_download_complete(&title);
            self.event_emitter
                .emit(DownloadEvent::completed(item_id.clone(), title));
        }

        self.publish(item_id).await;
        self.emit_queue_changed().await;
        self.drain_notify.notify_one();
    }

    /// Mark an in-flight item failed. No retry is attempted.
    async fn fail_item(&self, item_id: &ItemId, error: &DownloadError) {
        let failed = {
            let mut state = self.state.lock().await;
            state.items.get_mut(item_id).is_some_and(|entry| {
                entry.active_task = None;
                entry.live.clear();
                entry.grace_until = None;
                entry.chaining = false;
                entry.phase.transition(ItemTransition::TransferFailed).is_ok()
            })
        };

        if failed {
            tracing::warn!(
                target: "shelf.download",
                item = %item_id,
                error = %error,
                retry_on_enqueue = error.is_recoverable(),
                "Download failed"
            );
            self.event_emitter
                .emit(DownloadEvent::failed(item_id.clone(), error));
        }

        self.publish(item_id).await;
        self.drain_notify.notify_one();
    }

    /// Recompute an item's snapshot and push it to watchers and listeners.
    async fn publish(&self, item_id: &ItemId) {
        let snapshot = self.compute_progress(item_id).await;

        if let Some(tx) = self.state.lock().await.watchers.get(item_id) {
            tx.send_if_modified(|current| {
                if *current == snapshot {
                    false
                } else {
                    *current = snapshot;
                    true
                }
            });
        }

        self.event_emitter
            .emit(DownloadEvent::progress(item_id.clone(), snapshot));
    }

    async fn emit_queue_changed(&self) {
        let status = self.queue_status().await;
        self.event_emitter.emit(DownloadEvent::queue_changed(status));
    }

    /// Gather inputs for the aggregator.
    async fn progress_inputs(&self, item_id: &ItemId) -> ProgressInputs {
        let blocked = self.registry.is_blocked(item_id).await;
        let episode_id = {
            let state = self.state.lock().await;
            state.items.get(item_id).and_then(|e| e.episode_id.clone())
        };
        let tracks = self.tracks_for(item_id, episode_id).await;
        let records = self.records_or_empty().await;

        let mut inputs = ProgressInputs {
            blocked,
            completed: self.probe.count_local(item_id, tracks.as_deref()),
            ..Default::default()
        };
        if let Some(tracks) = &tracks {
            inputs.total_tracks = u32::try_from(tracks.len()).unwrap_or(u32::MAX);
        }
        for record in records
            .iter()
            .filter(|r| owner_of(&r.task).as_ref() == Some(item_id))
        {
            match record.status {
                TaskStatus::Failed => inputs.any_record_failed = true,
                TaskStatus::Running => inputs.any_record_running = true,
                _ => {}
            }
        }

        let now = Instant::now();
        let stale_after = self.config.stale_after;
        let state = self.state.lock().await;
        inputs.queued = state.queue.contains(item_id);
        if let Some(entry) = state.items.get(item_id) {
            inputs.phase = entry.phase;
            inputs.in_grace = entry.grace_until.is_some_and(|until| now < until);
            inputs.live = entry.live.is_live(now, stale_after);
            inputs.running_fraction = entry.live.fraction(now, stale_after);
        }
        inputs
    }
}

#[async_trait]
impl DownloadSchedulerPort for DownloadSchedulerImpl {
    async fn enqueue(
        &self,
        item_id: ItemId,
        episode_id: Option<String>,
        title: Option<String>,
    ) -> Result<(), DownloadError> {
        if !item_id.is_valid() {
            return Err(DownloadError::invalid_item(item_id.as_str()));
        }

        if self.registry.unblock(&item_id).await {
            tracing::debug!(target: "shelf.download", item = %item_id, "Unblocked");
        }
        self.enqueue_internal(&item_id, episode_id, title).await;
        Ok(())
    }

    async fn cancel(&self, item_id: &ItemId) -> Result<(), DownloadError> {
        if !item_id.is_valid() {
            return Err(DownloadError::invalid_item(item_id.as_str()));
        }
        self.cancel_item(item_id).await;
        Ok(())
    }

    async fn delete_local(&self, item_id: &ItemId) -> Result<(), DownloadError> {
        if !item_id.is_valid() {
            return Err(DownloadError::invalid_item(item_id.as_str()));
        }
        self.delete_item(item_id).await
    }

    async fn cancel_all(&self) -> Result<(), DownloadError> {
        self.cancel_everything().await;
        Ok(())
    }

    async fn resume_all(&self) -> Result<usize, DownloadError> {
        let records = self
            .engine
            .all_records()
            .await
            .map_err(|e| DownloadError::engine(e.to_string()))?;

        let mut candidates: Vec<ItemId> = Vec::new();
        for owner in records
            .iter()
            .filter(|r| r.status != TaskStatus::Complete)
            .filter_map(|r| owner_of(&r.task))
            .filter(ItemId::is_valid)
        {
            if !candidates.contains(&owner) {
                candidates.push(owner);
            }
        }
        {
            let state = self.state.lock().await;
            let mut failed: Vec<ItemId> = state
                .items
                .iter()
                .filter(|(_, entry)| entry.phase == ItemPhase::Failed)
                .map(|(id, _)| id.clone())
                .collect();
            failed.sort();
            for id in failed {
                if !candidates.contains(&id) {
                    candidates.push(id);
                }
            }
        }

        let mut resumed = 0;
        for item_id in candidates {
            if self.registry.is_blocked(&item_id).await {
                continue;
            }
            if self.enqueue_internal(&item_id, None, None).await {
                resumed += 1;
            }
        }

        tracing::info!(target: "shelf.download", count = resumed, "Resumed downloads");
        Ok(resumed)
    }

    async fn compute_progress(&self, item_id: &ItemId) -> ItemProgress {
        if !item_id.is_valid() {
            return ItemProgress::none();
        }
        aggregate(&self.progress_inputs(item_id).await)
    }

    async fn watch_progress(&self, item_id: &ItemId) -> watch::Receiver<ItemProgress> {
        let rx = {
            let mut state = self.state.lock().await;
            state
                .watchers
                .entry(item_id.clone())
                .or_insert_with(|| watch::channel(ItemProgress::none()).0)
                .subscribe()
        };
        self.publish(item_id).await;
        rx
    }

    async fn list_tracked_item_ids(&self) -> Vec<ItemId> {
        let state = self.state.lock().await;
        let mut ids = state.queue.item_ids();
        let mut activated: Vec<ItemId> = state
            .items
            .iter()
            .filter(|(id, entry)| entry.phase.is_activated() && !state.queue.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        activated.sort();
        ids.extend(activated);
        ids
    }

    async fn queue_status(&self) -> QueueStatus {
        let blocked = self.registry.snapshot().await;
        let state = self.state.lock().await;
        QueueStatus {
            length: state.queue.len(),
            items: state.queue.item_ids(),
            is_processing: self.draining.load(Ordering::SeqCst) || state.slot_busy(None),
            blocked,
        }
    }
}
