//! JSON file backed preference store.
//!
//! Keeps every preference in one small JSON document. Writes go to a
//! sibling `.tmp` file first and are renamed over the real file, so a crash
//! mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use shelf_core::ports::{PortError, PreferenceStorePort};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
struct PreferenceDocument {
    lists: BTreeMap<String, Vec<String>>,
    flags: BTreeMap<String, bool>,
}

/// Preference store persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    doc: Mutex<PreferenceDocument>,
}

impl JsonFilePreferenceStore {
    /// Open a store. A missing file starts empty; a corrupt one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PortError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => PreferenceDocument::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PreferenceDocument::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(target: "shelf.download", path = %path.display(), "Opened preference store");

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, doc: &PreferenceDocument) -> Result<(), PortError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStorePort for JsonFilePreferenceStore {
    async fn get_string_list(&self, key: &str) -> Result<Vec<String>, PortError> {
        Ok(self.doc.lock().await.lists.get(key).cloned().unwrap_or_default())
    }

    async fn set_string_list(&self, key: &str, values: &[String]) -> Result<(), PortError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.lists.insert(key.to_string(), values.to_vec());
        self.save(&next).await?;
        *doc = next;
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, PortError> {
        Ok(self.doc.lock().await.flags.get(key).copied())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PortError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.flags.insert(key.to_string(), value);
        self.save(&next).await?;
        *doc = next;
        Ok(())
    }
}
