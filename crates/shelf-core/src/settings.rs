//! Scheduler settings and validation.
//!
//! User-tunable overrides for the scheduler timings. These are pure domain
//! types with no infrastructure dependencies; hosts load them from wherever
//! they keep configuration and apply them with
//! [`DownloadSchedulerConfig::apply_settings`](crate::ports::DownloadSchedulerConfig::apply_settings).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted value for any timing override.
pub const MAX_TIMING_MS: u64 = 60_000;

/// Scheduler timing overrides.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Directory holding downloaded items.
    pub downloads_directory: Option<String>,
    /// Chain listener debounce in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Live-flag staleness window in milliseconds.
    pub stale_after_ms: Option<u64>,
    /// Minimum spacing between scheduling attempts per item.
    pub reschedule_throttle_ms: Option<u64>,
    /// Post-cancel halt window in milliseconds.
    pub halt_window_ms: Option<u64>,
    /// Drain settle delay in milliseconds.
    pub settle_delay_ms: Option<u64>,
    /// Just-queued grace window in milliseconds.
    pub queued_grace_ms: Option<u64>,
}

/// Errors that can occur during settings validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A timing value is outside the accepted range.
    #[error("{field} must be between {min} and {max} ms, got {value}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Provided value.
        value: u64,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// The downloads directory is empty.
    #[error("Downloads directory cannot be empty")]
    EmptyDownloadsDirectory,
}

/// Validate settings values.
pub fn validate_settings(settings: &SchedulerSettings) -> Result<(), SettingsError> {
    if let Some(dir) = &settings.downloads_directory {
        if dir.trim().is_empty() {
            return Err(SettingsError::EmptyDownloadsDirectory);
        }
    }

    let checks = [
        ("debounce_ms", settings.debounce_ms, 0),
        ("stale_after_ms", settings.stale_after_ms, 100),
        ("reschedule_throttle_ms", settings.reschedule_throttle_ms, 0),
        ("halt_window_ms", settings.halt_window_ms, 0),
        ("settle_delay_ms", settings.settle_delay_ms, 0),
        ("queued_grace_ms", settings.queued_grace_ms, 0),
    ];

    for (field, value, min) in checks {
        if let Some(value) = value {
            if !(min..=MAX_TIMING_MS).contains(&value) {
                return Err(SettingsError::OutOfRange {
                    field,
                    value,
                    min,
                    max: MAX_TIMING_MS,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&SchedulerSettings::default()).is_ok());
    }

    #[test]
    fn test_stale_window_has_floor() {
        let settings = SchedulerSettings {
            stale_after_ms: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::OutOfRange {
                field: "stale_after_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_huge_halt_window() {
        let settings = SchedulerSettings {
            halt_window_ms: Some(MAX_TIMING_MS + 1),
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_blank_directory() {
        let settings = SchedulerSettings {
            downloads_directory: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::EmptyDownloadsDirectory)
        );
    }

    #[test]
    fn test_partial_json_deserializes() {
        let settings: SchedulerSettings =
            serde_json::from_str(r#"{"halt_window_ms": 2000}"#).unwrap();
        assert_eq!(settings.halt_window_ms, Some(2000));
        assert_eq!(settings.debounce_ms, None);
    }
}
