//! Common test utilities.
//!
//! In-memory collaborators for the scheduler: a transfer engine that only
//! moves when the test tells it to, a track source, a recording notifier and
//! a recording event emitter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use shelf_core::ports::{MemoryPreferenceStore, PortError};
use shelf_download::{
    DownloadEvent, DownloadEventEmitterPort, DownloadNotifierPort, DownloadSchedulerConfig,
    DownloadSchedulerDeps, DownloadSchedulerImpl, ItemId, PreferenceStorePort, RemoteTrack,
    TaskDescriptor, TaskRecord, TaskStatus, TaskUpdate, TrackSourcePort, TransferEnginePort,
    build_download_scheduler, owner_of,
};

/// Install a test subscriber once (honours `RUST_LOG`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it holds. Panics after a minute of (virtual) time.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..6000 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Let every timer of the scheduler run out.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

// =============================================================================
// Transfer engine
// =============================================================================

/// Transfer engine that keeps records in memory and never moves on its own.
pub struct FakeEngine {
    records: Mutex<Vec<TaskRecord>>,
    tx: Mutex<Option<broadcast::Sender<TaskUpdate>>>,
    submitted: Mutex<Vec<TaskDescriptor>>,
    canceled: Mutex<Vec<String>>,
    max_active: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(256);
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            tx: Mutex::new(Some(tx)),
            submitted: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
            max_active: AtomicUsize::new(0),
        })
    }

    fn send(&self, update: TaskUpdate) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(update);
        }
    }

    fn active_records(&self) -> Vec<TaskRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status.is_active())
            .cloned()
            .collect()
    }

    /// Number of records in `{Enqueued, Running}`.
    pub fn active_count(&self) -> usize {
        self.active_records().len()
    }

    /// Highest number of simultaneously active records ever seen.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<TaskDescriptor> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn canceled_ids(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().unwrap().clone()
    }

    /// The single active task, if any.
    pub fn active_task(&self) -> Option<TaskDescriptor> {
        self.active_records().into_iter().next().map(|r| r.task)
    }

    /// Insert a record directly, as if left over from a previous run.
    pub fn insert_record(&self, record: TaskRecord) {
        self.records.lock().unwrap().push(record);
    }

    fn set_status(&self, task_id: &str, status: TaskStatus) -> Option<TaskDescriptor> {
        let task = {
            let mut records = self.records.lock().unwrap();
            let record = records.iter_mut().find(|r| r.task.task_id == task_id)?;
            record.status = status;
            record.task.clone()
        };
        self.send(TaskUpdate::status(task.clone(), status));
        Some(task)
    }

    /// Move the active task to `Running` and report some progress.
    pub fn start_active(&self, fraction: f64) -> TaskDescriptor {
        let task = self.active_task().expect("no active task");
        self.set_status(&task.task_id, TaskStatus::Running);
        self.send(TaskUpdate::progress(task.clone(), fraction));
        task
    }

    /// Write part of the active task's file, as a real transfer would.
    pub fn write_partial(&self, task: &TaskDescriptor) {
        std::fs::create_dir_all(&task.directory).unwrap();
        std::fs::write(task.destination(), b"partial").unwrap();
    }

    /// Finish the active task: write its file and report `Complete`.
    pub fn complete_active(&self) -> TaskDescriptor {
        let task = self.active_task().expect("no active task");
        std::fs::create_dir_all(&task.directory).unwrap();
        std::fs::write(task.destination(), b"audio").unwrap();
        self.set_status(&task.task_id, TaskStatus::Complete);
        task
    }

    /// Fail the active task.
    pub fn fail_active(&self) -> TaskDescriptor {
        let task = self.active_task().expect("no active task");
        self.set_status(&task.task_id, TaskStatus::Failed);
        task
    }

    /// Re-send an update for a task, bypassing the record store.
    pub fn replay(&self, task: &TaskDescriptor, status: TaskStatus) {
        self.send(TaskUpdate::status(task.clone(), status));
    }

    /// Re-send a progress update for a task.
    pub fn replay_progress(&self, task: &TaskDescriptor, fraction: f64) {
        self.send(TaskUpdate::progress(task.clone(), fraction));
    }

    /// Push `count` progress updates of an untracked task, enough to
    /// overrun a listener that has not caught up yet.
    pub fn flood(&self, count: usize) {
        let noise = foreign_record(
            std::path::Path::new("/nowhere"),
            &ItemId::new("noise"),
            0,
            TaskStatus::Running,
        )
        .task;
        for _ in 0..count {
            self.send(TaskUpdate::progress(noise.clone(), 0.5));
        }
    }

    /// Close the update stream.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }
}

#[async_trait]
impl TransferEnginePort for FakeEngine {
    async fn enqueue(&self, task: TaskDescriptor) -> Result<(), PortError> {
        let active = {
            let mut records = self.records.lock().unwrap();
            records.push(TaskRecord::new(task.clone(), TaskStatus::Enqueued));
            records.iter().filter(|r| r.status.is_active()).count()
        };
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(task.clone());
        self.send(TaskUpdate::status(task, TaskStatus::Enqueued));
        Ok(())
    }

    async fn cancel_by_ids(&self, task_ids: &[String]) -> Result<(), PortError> {
        self.canceled.lock().unwrap().extend(task_ids.iter().cloned());
        let canceled: Vec<TaskDescriptor> = {
            let mut records = self.records.lock().unwrap();
            records
                .iter_mut()
                .filter(|r| r.status.is_active() && task_ids.contains(&r.task.task_id))
                .map(|r| {
                    r.status = TaskStatus::Canceled;
                    r.task.clone()
                })
                .collect()
        };
        for task in canceled {
            self.send(TaskUpdate::status(task, TaskStatus::Canceled));
        }
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<TaskRecord>, PortError> {
        Ok(self.records())
    }

    async fn delete_record(&self, task_id: &str) -> Result<(), PortError> {
        self.records
            .lock()
            .unwrap()
            .retain(|r| r.task.task_id != task_id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TaskUpdate> {
        match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}

/// Build a record for `item_id` outside the scheduler.
pub fn foreign_record(
    root: &std::path::Path,
    item_id: &ItemId,
    index: u32,
    status: TaskStatus,
) -> TaskRecord {
    let task = TaskDescriptor {
        task_id: format!("old-{item_id}-{index}"),
        url: format!("https://library.test/{item_id}/{index}"),
        filename: shelf_download::track_filename(index, "audio/mpeg"),
        directory: root.join(item_id.as_str()),
        requires_wifi: false,
        metadata: format!(r#"{{"libraryItemId":"{item_id}","trackIndex":{index}}}"#),
        group: item_id.group(),
    };
    assert_eq!(owner_of(&task).as_ref(), Some(item_id));
    TaskRecord::new(task, status)
}

// =============================================================================
// Track source
// =============================================================================

/// Track source backed by a map of books.
#[derive(Default)]
pub struct FakeTrackSource {
    books: Mutex<HashMap<ItemId, Vec<RemoteTrack>>>,
    calls: AtomicUsize,
}

impl FakeTrackSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a book with `count` MP3 tracks.
    pub fn add_book(&self, item_id: &str, count: u32) {
        let tracks = (0..count)
            .map(|i| {
                RemoteTrack::new(i, format!("https://library.test/{item_id}/{i}"), "audio/mpeg")
                    .with_duration(600.0)
            })
            .collect();
        self.books
            .lock()
            .unwrap()
            .insert(ItemId::new(item_id), tracks);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackSourcePort for FakeTrackSource {
    async fn get_tracks(
        &self,
        item_id: &ItemId,
        _episode_id: Option<String>,
    ) -> Result<Vec<RemoteTrack>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.books
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(item_id.to_string()))
    }
}

// =============================================================================
// Notifier and emitter
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub started: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
    pub canceled: AtomicUsize,
}

impl RecordingNotifier {
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn canceled(&self) -> usize {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl DownloadNotifierPort for RecordingNotifier {
    fn on_download_started(&self, title: &str) {
        self.started.lock().unwrap().push(title.to_string());
    }

    fn on_download_complete(&self, title: &str) {
        self.completed.lock().unwrap().push(title.to_string());
    }

    fn on_download_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<DownloadEvent>>>,
}

impl RecordingEmitter {
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(DownloadEvent::event_name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl DownloadEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: DownloadEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A scheduler wired to fakes over a temporary downloads directory.
pub struct Harness {
    pub scheduler: Arc<DownloadSchedulerImpl>,
    pub engine: Arc<FakeEngine>,
    pub tracks: Arc<FakeTrackSource>,
    pub prefs: Arc<MemoryPreferenceStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub emitter: RecordingEmitter,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(
            FakeEngine::new(),
            Arc::new(MemoryPreferenceStore::new()),
            TempDir::new().unwrap(),
        )
        .await
    }

    /// Build over existing engine state, preferences and directory.
    pub async fn build(
        engine: Arc<FakeEngine>,
        prefs: Arc<MemoryPreferenceStore>,
        dir: TempDir,
    ) -> Self {
        init_tracing();
        let tracks = FakeTrackSource::new();
        Self::build_with_source(engine, prefs, dir, tracks.clone(), tracks).await
    }

    pub async fn build_with_source(
        engine: Arc<FakeEngine>,
        prefs: Arc<MemoryPreferenceStore>,
        dir: TempDir,
        tracks: Arc<FakeTrackSource>,
        track_source: Arc<dyn TrackSourcePort>,
    ) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let emitter = RecordingEmitter::default();
        let preferences: Arc<dyn PreferenceStorePort> = prefs.clone();

        let scheduler = build_download_scheduler(DownloadSchedulerDeps {
            engine: engine.clone(),
            track_source,
            preferences,
            notifier: notifier.clone(),
            event_emitter: Arc::new(emitter.clone()),
            config: DownloadSchedulerConfig::new(dir.path().to_path_buf()),
        })
        .await
        .expect("scheduler builds");

        Self {
            scheduler,
            engine,
            tracks,
            prefs,
            notifier,
            emitter,
            dir,
        }
    }

    pub fn item_dir(&self, item_id: &str) -> PathBuf {
        self.dir.path().join(item_id)
    }

    /// Write a finished track file directly.
    pub fn write_track(&self, item_id: &str, index: u32) {
        let dir = self.item_dir(item_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(shelf_download::track_filename(index, "audio/mpeg")), b"audio")
            .unwrap();
    }

    /// Wait until the engine has seen `count` submissions.
    pub async fn wait_submitted(&self, count: usize) {
        let engine = self.engine.clone();
        wait_for(&format!("{count} submissions"), || {
            let engine = engine.clone();
            async move { engine.submitted_count() >= count }
        })
        .await;
    }
}
