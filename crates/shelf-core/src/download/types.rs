//! Core domain types for downloads.
//!
//! Pure data types with no I/O dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of a library item (a book or podcast).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new item ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether the id can name an item directory.
    ///
    /// Blank ids and the relative names `.` and `..` are rejected; they
    /// would resolve to the downloads root or its parent.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_blank() && !matches!(self.0.as_str(), "." | "..") && !self.0.contains('\0')
    }

    /// Single path component naming the item's directory.
    ///
    /// Separators become `_`, and an all-dot result is replaced too, so the
    /// name never leaves the directory it is joined to.
    #[must_use]
    pub fn dir_name(&self) -> String {
        let name = self.0.replace(['/', '\\', '\0'], "_");
        if name.is_empty() || name.chars().all(|c| c == '.') {
            "_".repeat(name.len().max(1))
        } else {
            name
        }
    }

    /// Name of the transfer engine group holding this item's tasks.
    #[must_use]
    pub fn group(&self) -> String {
        format!("{GROUP_PREFIX}{}", self.0)
    }

    /// Recover an item id from a group name produced by [`ItemId::group`].
    #[must_use]
    pub fn from_group(group: &str) -> Option<Self> {
        group
            .strip_prefix(GROUP_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(Self::new)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

const GROUP_PREFIX: &str = "book-";

/// One remote audio file of an item, as reported by the track source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    /// Zero-based track index.
    pub index: u32,
    /// Download URL.
    pub url: String,
    /// MIME type reported by the server (e.g. `audio/mpeg`).
    pub mime_type: String,
    /// Duration in seconds.
    pub duration_seconds: f64,
}

impl RemoteTrack {
    /// Create a new remote track.
    pub fn new(index: u32, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            mime_type: mime_type.into(),
            duration_seconds: 0.0,
        }
    }

    /// Set the duration.
    #[must_use]
    pub const fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }
}

/// Status of a task as tracked by the transfer engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the engine, not yet started.
    Enqueued,
    /// Bytes are being transferred.
    Running,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Failed,
    /// Canceled before completion.
    Canceled,
}

impl TaskStatus {
    /// Whether the task still occupies the transfer slot.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Enqueued | Self::Running)
    }

    /// Whether the task reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every task so events can be traced back to their item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Item that owns the task.
    #[serde(rename = "libraryItemId")]
    pub library_item_id: String,
    /// Index of the track being downloaded.
    #[serde(rename = "trackIndex", default, skip_serializing_if = "Option::is_none")]
    pub track_index: Option<u32>,
}

impl TaskMetadata {
    /// Metadata for a track of the given item.
    pub fn for_track(item_id: &ItemId, track_index: u32) -> Self {
        Self {
            library_item_id: item_id.as_str().to_string(),
            track_index: Some(track_index),
        }
    }

    /// Encode as the JSON string stored on the task.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from a task's metadata string.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The owning item id, if non-empty.
    #[must_use]
    pub fn item_id(&self) -> Option<ItemId> {
        let id = ItemId::new(self.library_item_id.clone());
        (!id.is_blank()).then_some(id)
    }
}

/// A single-file download handed to the transfer engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Unique task id.
    pub task_id: String,
    /// Source URL.
    pub url: String,
    /// Destination file name.
    pub filename: String,
    /// Destination directory.
    pub directory: PathBuf,
    /// Only transfer over Wi-Fi.
    pub requires_wifi: bool,
    /// JSON encoded [`TaskMetadata`].
    pub metadata: String,
    /// Group name (`book-<itemId>`).
    pub group: String,
}

impl TaskDescriptor {
    /// Full destination path of the file.
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Durable record the transfer engine keeps for each task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// The submitted task.
    pub task: TaskDescriptor,
    /// Last persisted status.
    pub status: TaskStatus,
}

impl TaskRecord {
    /// Create a record.
    pub const fn new(task: TaskDescriptor, status: TaskStatus) -> Self {
        Self { task, status }
    }

    /// Task id shortcut.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task.task_id
    }
}

/// Payload of an engine update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskUpdateKind {
    /// Fractional progress of the task.
    Progress(f64),
    /// Status change of the task.
    Status(TaskStatus),
}

/// Raw event broadcast by the transfer engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// The task the update refers to.
    pub task: TaskDescriptor,
    /// What changed.
    pub kind: TaskUpdateKind,
}

impl TaskUpdate {
    /// Progress update.
    pub const fn progress(task: TaskDescriptor, fraction: f64) -> Self {
        Self {
            task,
            kind: TaskUpdateKind::Progress(fraction),
        }
    }

    /// Status update.
    pub const fn status(task: TaskDescriptor, status: TaskStatus) -> Self {
        Self {
            task,
            kind: TaskUpdateKind::Status(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_round_trip() {
        let id = ItemId::new("li_42");
        assert_eq!(id.group(), "book-li_42");
        assert_eq!(ItemId::from_group("book-li_42"), Some(id));
        assert_eq!(ItemId::from_group("book-"), None);
        assert_eq!(ItemId::from_group("podcast-li_42"), None);
    }

    #[test]
    fn test_relative_ids_are_invalid() {
        assert!(ItemId::new("li_42").is_valid());
        assert!(ItemId::new("lib/li_42").is_valid());
        assert!(!ItemId::new("").is_valid());
        assert!(!ItemId::new(" ").is_valid());
        assert!(!ItemId::new(".").is_valid());
        assert!(!ItemId::new("..").is_valid());
    }

    #[test]
    fn test_dir_name_is_one_normal_component() {
        use std::path::{Component, Path};

        for raw in ["li_42", "a/b", "..", ".", "../..", "a\\..", ""] {
            let name = ItemId::new(raw).dir_name();
            let components: Vec<_> = Path::new(&name).components().collect();
            assert_eq!(components.len(), 1, "{raw:?} -> {name:?}");
            assert!(matches!(components[0], Component::Normal(_)), "{raw:?}");
        }
        assert_eq!(ItemId::new("lib/li_1").dir_name(), "lib_li_1");
        assert_eq!(ItemId::new("..").dir_name(), "__");
    }

    #[test]
    fn test_metadata_uses_library_item_key() {
        let meta = TaskMetadata::for_track(&ItemId::new("b1"), 2);
        let json = meta.encode().unwrap();
        assert!(json.contains("\"libraryItemId\":\"b1\""));

        let legacy = TaskMetadata::decode(r#"{"libraryItemId":"b1"}"#).unwrap();
        assert_eq!(legacy.item_id(), Some(ItemId::new("b1")));
        assert_eq!(legacy.track_index, None);
    }

    #[test]
    fn test_blank_metadata_has_no_item() {
        let meta = TaskMetadata::decode(r#"{"libraryItemId":"  "}"#).unwrap();
        assert!(meta.item_id().is_none());
    }

    #[test]
    fn test_task_status_activity() {
        assert!(TaskStatus::Enqueued.is_active());
        assert!(TaskStatus::Running.is_active());
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }
}
