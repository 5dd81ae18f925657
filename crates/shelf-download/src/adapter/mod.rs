//! Transfer engine boundary.
//!
//! Builds task descriptors for tracks and turns raw [`TaskUpdate`]s into
//! typed [`ItemEvent`]s. Everything past this module works with item ids
//! instead of engine metadata strings.

use std::path::PathBuf;

use uuid::Uuid;

use shelf_core::download::{
    DownloadError, ItemId, RemoteTrack, TaskDescriptor, TaskMetadata, TaskStatus, TaskUpdate,
    TaskUpdateKind,
};

use crate::probe::track_filename;

/// What happened to one of an item's tasks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemEventKind {
    /// Transfer progress, clamped to `[0, 1]`.
    Progress(f64),
    /// Status change.
    Status(TaskStatus),
}

/// An engine update resolved to its owning item.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemEvent {
    /// Owning item.
    pub item_id: ItemId,
    /// Engine task id.
    pub task_id: String,
    /// Track the task downloads, when the metadata says so.
    pub track_index: Option<u32>,
    /// Destination of the task.
    pub destination: PathBuf,
    /// Payload.
    pub kind: ItemEventKind,
}

impl ItemEvent {
    /// Whether this is a status change (as opposed to progress).
    pub const fn is_status(&self) -> bool {
        matches!(self.kind, ItemEventKind::Status(_))
    }
}

/// Resolve the item owning a task: metadata first, group name second.
pub fn owner_of(task: &TaskDescriptor) -> Option<ItemId> {
    TaskMetadata::decode(&task.metadata)
        .ok()
        .and_then(|meta| meta.item_id())
        .or_else(|| ItemId::from_group(&task.group))
}

fn track_index_of(task: &TaskDescriptor) -> Option<u32> {
    TaskMetadata::decode(&task.metadata)
        .ok()
        .and_then(|meta| meta.track_index)
}

/// Convert a raw engine update.
///
/// Returns `None` for tasks that belong to no item, and for progress values
/// that are negative or not a number (engines use those as sentinels).
pub fn to_item_event(update: TaskUpdate) -> Option<ItemEvent> {
    let kind = match update.kind {
        TaskUpdateKind::Progress(fraction) if fraction.is_nan() || fraction < 0.0 => return None,
        TaskUpdateKind::Progress(fraction) => ItemEventKind::Progress(fraction.min(1.0)),
        TaskUpdateKind::Status(status) => ItemEventKind::Status(status),
    };
    let item_id = owner_of(&update.task)?;

    Some(ItemEvent {
        item_id,
        track_index: track_index_of(&update.task),
        destination: update.task.destination(),
        task_id: update.task.task_id,
        kind,
    })
}

/// Mint a fresh task id.
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build the descriptor downloading `track` of `item_id` into `directory`.
pub fn describe_track(
    task_id: String,
    item_id: &ItemId,
    track: &RemoteTrack,
    directory: PathBuf,
    requires_wifi: bool,
) -> Result<TaskDescriptor, DownloadError> {
    let metadata = TaskMetadata::for_track(item_id, track.index)
        .encode()
        .map_err(|e| DownloadError::other(format!("encode task metadata: {e}")))?;

    Ok(TaskDescriptor {
        task_id,
        url: track.url.clone(),
        filename: track_filename(track.index, &track.mime_type),
        directory,
        requires_wifi,
        metadata,
        group: item_id.group(),
    })
}
