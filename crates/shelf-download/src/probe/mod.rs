//! Local file probe.
//!
//! Each item owns one directory under the downloads root; track `n` lives at
//! `track_<nnn>.<ext>` inside it. The probe answers "which tracks are on
//! disk" and performs the best-effort cleanups used by cancellation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use shelf_core::download::{DownloadError, ItemId, RemoteTrack};

const TRACK_PREFIX: &str = "track_";
const LEFTOVER_SUFFIXES: [&str; 2] = [".part", ".tmp"];

/// File extension for a track MIME type.
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("mpeg") {
        "mp3"
    } else if mime.contains("mp4") || mime.contains("aac") {
        "m4a"
    } else if mime.contains("flac") {
        "flac"
    } else {
        "bin"
    }
}

/// File name of a track (`track_007.mp3`).
#[must_use]
pub fn track_filename(index: u32, mime_type: &str) -> String {
    format!("{TRACK_PREFIX}{index:03}.{}", extension_for_mime(mime_type))
}

/// Parse the track index out of a finished track file name.
fn parse_track_index(file_name: &str) -> Option<u32> {
    if LEFTOVER_SUFFIXES.iter().any(|s| file_name.ends_with(s)) {
        return None;
    }
    let rest = file_name.strip_prefix(TRACK_PREFIX)?;
    let (digits, ext) = rest.split_once('.')?;
    if digits.len() < 3 || ext.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Reports and cleans up the on-disk state of items.
#[derive(Debug, Clone)]
pub struct LocalFileProbe {
    root: PathBuf,
}

impl LocalFileProbe {
    /// Create a probe over a downloads root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The downloads root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an item; always a direct child of the root.
    pub fn item_dir(&self, item_id: &ItemId) -> PathBuf {
        self.root.join(item_id.dir_name())
    }

    /// Full path of a track file.
    pub fn track_path(&self, item_id: &ItemId, track: &RemoteTrack) -> PathBuf {
        self.item_dir(item_id)
            .join(track_filename(track.index, &track.mime_type))
    }

    /// Whether the track's file is present.
    pub fn has_track(&self, item_id: &ItemId, track: &RemoteTrack) -> bool {
        self.track_path(item_id, track).is_file()
    }

    /// Indices of every finished track file in the item directory.
    pub fn existing_indices(&self, item_id: &ItemId) -> BTreeSet<u32> {
        let Ok(entries) = std::fs::read_dir(self.item_dir(item_id)) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| parse_track_index(&entry.file_name().to_string_lossy()))
            .collect()
    }

    /// First track (in index order) whose file is missing.
    pub fn first_missing<'a>(
        &self,
        item_id: &ItemId,
        tracks: &'a [RemoteTrack],
    ) -> Option<&'a RemoteTrack> {
        let mut ordered: Vec<&RemoteTrack> = tracks.iter().collect();
        ordered.sort_by_key(|t| t.index);
        ordered.into_iter().find(|t| !self.has_track(item_id, t))
    }

    /// Number of present tracks.
    ///
    /// With a known track list only its tracks are counted; otherwise every
    /// finished track file in the directory is.
    #[allow(clippy::cast_possible_truncation)]
    pub fn count_local(&self, item_id: &ItemId, tracks: Option<&[RemoteTrack]>) -> u32 {
        match tracks {
            Some(tracks) => tracks.iter().filter(|t| self.has_track(item_id, t)).count() as u32,
            None => self.existing_indices(item_id).len() as u32,
        }
    }

    /// Best-effort removal of a partially written file.
    pub fn remove_partial(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(target: "shelf.download", path = %path.display(), "Removed partial file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    target: "shelf.download",
                    path = %path.display(),
                    error = %e,
                    "Failed to remove partial file"
                );
            }
        }
    }

    /// Best-effort removal of `.part`/`.tmp` leftovers. Returns how many went.
    pub fn remove_leftovers(&self, item_id: &ItemId) -> usize {
        let Ok(entries) = std::fs::read_dir(self.item_dir(item_id)) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if LEFTOVER_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                if std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                } else {
                    tracing::warn!(target: "shelf.download", file = %name, "Failed to remove leftover");
                }
            }
        }
        removed
    }

    /// Recursively delete the item directory. A missing directory is fine.
    pub fn remove_item_dir(&self, item_id: &ItemId) -> Result<(), DownloadError> {
        if !item_id.is_valid() {
            return Err(DownloadError::invalid_item(item_id.as_str()));
        }
        let dir = self.item_dir(item_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DownloadError::from_io_error(&e)),
        }
    }
}
