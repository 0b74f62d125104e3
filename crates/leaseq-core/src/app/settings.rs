//! QueueProcessorSettings - immutable processor configuration
//!
//! Loaded from TOML (durations in milliseconds) or built in code, and
//! validated once before any worker starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::outcome::duration_ms;

/// Why a processor could not be built.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("number_of_threads must be at least 1 (got {0})")]
    InvalidThreadCount(usize),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("queue name is missing or invalid: {0:?}")]
    MissingQueueName(String),

    #[error("could not read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// # Example
/// ```toml
/// number_of_threads = 8
/// item_lock_duration_ms = 60000
/// thread_sleep_time_ms = 500
/// item_retry_delay_ms = 10000
/// ```
///
/// `item_lock_duration` has to comfortably exceed handler latency, or
/// items get redelivered while still being worked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueProcessorSettings {
    pub number_of_threads: usize,

    #[serde(rename = "item_lock_duration_ms", with = "duration_ms")]
    pub item_lock_duration: Duration,

    /// Backoff after an empty poll or a failed store call.
    #[serde(rename = "thread_sleep_time_ms", with = "duration_ms")]
    pub thread_sleep_time: Duration,

    /// Delay before a `Retry` (or failed) item is leasable again.
    #[serde(rename = "item_retry_delay_ms", with = "duration_ms")]
    pub item_retry_delay: Duration,
}

impl Default for QueueProcessorSettings {
    fn default() -> Self {
        Self {
            number_of_threads: 4,
            item_lock_duration: Duration::from_secs(30),
            thread_sleep_time: Duration::from_secs(1),
            item_retry_delay: Duration::from_secs(5),
        }
    }
}

impl QueueProcessorSettings {
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.number_of_threads < 1 {
            return Err(SettingsError::InvalidThreadCount(self.number_of_threads));
        }
        if self.item_lock_duration.is_zero() {
            return Err(SettingsError::ZeroDuration("item_lock_duration"));
        }
        if self.thread_sleep_time.is_zero() {
            return Err(SettingsError::ZeroDuration("thread_sleep_time"));
        }
        Ok(())
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.number_of_threads = n;
        self
    }

    pub fn with_lock_duration(mut self, d: Duration) -> Self {
        self.item_lock_duration = d;
        self
    }

    pub fn with_sleep_time(mut self, d: Duration) -> Self {
        self.thread_sleep_time = d;
        self
    }

    pub fn with_retry_delay(mut self, d: Duration) -> Self {
        self.item_retry_delay = d;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = QueueProcessorSettings::default();
        s.validate().unwrap();
        assert_eq!(s.number_of_threads, 4);
        assert_eq!(s.item_lock_duration, Duration::from_secs(30));
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let s = QueueProcessorSettings::from_toml_str(
            "number_of_threads = 8\nitem_retry_delay_ms = 250\n",
        )
        .unwrap();
        assert_eq!(s.number_of_threads, 8);
        assert_eq!(s.item_retry_delay, Duration::from_millis(250));
        assert_eq!(s.thread_sleep_time, Duration::from_secs(1));
    }

    #[test]
    fn zero_threads_fail_fast() {
        let err = QueueProcessorSettings::from_toml_str("number_of_threads = 0").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidThreadCount(0)));
    }

    #[test]
    fn zero_lock_duration_fails_fast() {
        let err = QueueProcessorSettings::default()
            .with_lock_duration(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SettingsError::ZeroDuration("item_lock_duration")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = QueueProcessorSettings::from_toml_str("threads = 2").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
