//! Preference store port definition.
//!
//! Small key/value preferences owned by the platform (shared preferences,
//! user defaults). The scheduler stores its blocked-item registry here and
//! reads the Wi-Fi-only flag.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::PortError;

/// Port for reading and writing user preferences.
#[async_trait]
pub trait PreferenceStorePort: Send + Sync {
    /// Read a string list. Missing keys yield an empty list.
    async fn get_string_list(&self, key: &str) -> Result<Vec<String>, PortError>;

    /// Replace a string list.
    async fn set_string_list(&self, key: &str, values: &[String]) -> Result<(), PortError>;

    /// Read a boolean flag. Missing keys yield `None`.
    async fn get_bool(&self, key: &str) -> Result<Option<bool>, PortError>;

    /// Write a boolean flag.
    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PortError>;
}

/// Process-local preference store.
///
/// Nothing survives a restart; useful for tests and for hosts that persist
/// preferences themselves.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    lists: Mutex<HashMap<String, Vec<String>>>,
    flags: Mutex<HashMap<String, bool>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn storage_error<T>(_: T) -> PortError {
        PortError::Storage("preference store lock poisoned".to_string())
    }
}

#[async_trait]
impl PreferenceStorePort for MemoryPreferenceStore {
    async fn get_string_list(&self, key: &str) -> Result<Vec<String>, PortError> {
        let lists = self.lists.lock().map_err(Self::storage_error)?;
        Ok(lists.get(key).cloned().unwrap_or_default())
    }

    async fn set_string_list(&self, key: &str, values: &[String]) -> Result<(), PortError> {
        let mut lists = self.lists.lock().map_err(Self::storage_error)?;
        lists.insert(key.to_string(), values.to_vec());
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, PortError> {
        let flags = self.flags.lock().map_err(Self::storage_error)?;
        Ok(flags.get(key).copied())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PortError> {
        let mut flags = self.flags.lock().map_err(Self::storage_error)?;
        flags.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_keys_have_defaults() {
        let store = MemoryPreferenceStore::new();
        assert!(store.get_string_list("nope").await.unwrap().is_empty());
        assert_eq!(store.get_bool("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_round_trip() {
        let store = MemoryPreferenceStore::new();
        let values = vec!["a".to_string(), "b".to_string()];
        tokio_test::assert_ok!(store.set_string_list("k", &values).await);
        tokio_test::assert_ok!(store.set_bool("wifi", true).await);

        assert_eq!(store.get_string_list("k").await.unwrap(), values);
        assert_eq!(store.get_bool("wifi").await.unwrap(), Some(true));
    }
}
