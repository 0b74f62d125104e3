//! Outcome model: what a handler reports, and what the store is told.
//!
//! There are two result types on purpose:
//! - `MessageProcessingResult` is what handler authors can construct.
//! - `ProcessingResult` is what the worker actually resolves. It adds the
//!   framework-only `UnhandledException` (handler errored or panicked) and
//!   `Invalid` (a handler result that could not be interpreted).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result a handler returns for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageProcessingResult {
    /// Done. The item is removed.
    Success,
    /// Try again after the processor's retry delay.
    Retry,
    /// Unprocessable. The item is dead-lettered, never retried.
    BadMessage,
}

/// Result the worker resolves into a store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    Success,
    Retry,
    BadMessage,
    /// Handler failed (error or panic). Resolved like `Retry`, always
    /// counted as an operational failure.
    UnhandledException(String),
    /// A result the framework could not interpret. Logged loudly and
    /// resolved like `UnhandledException`.
    Invalid(String),
}

impl From<MessageProcessingResult> for ProcessingResult {
    fn from(value: MessageProcessingResult) -> Self {
        match value {
            MessageProcessingResult::Success => ProcessingResult::Success,
            MessageProcessingResult::Retry => ProcessingResult::Retry,
            MessageProcessingResult::BadMessage => ProcessingResult::BadMessage,
        }
    }
}

impl ProcessingResult {
    /// Counted as an operational failure?
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProcessingResult::UnhandledException(_) | ProcessingResult::Invalid(_)
        )
    }
}

/// Mutation requested by `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReleaseOutcome {
    /// Delete the item (processed).
    Commit,
    /// Delete the item (unprocessable), recorded separately from `Commit`.
    DeadLetter,
    /// Clear the lease; the item becomes eligible again after `delay`.
    RequeueAfter {
        #[serde(rename = "delayMs", with = "duration_ms")]
        delay: Duration,
    },
}

impl ReleaseOutcome {
    pub fn requeue_after(delay: Duration) -> Self {
        ReleaseOutcome::RequeueAfter { delay }
    }

    /// Removes the item from the queue?
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseOutcome::Commit | ReleaseOutcome::DeadLetter)
    }
}

/// Durations travel as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn release_outcome_is_tagged_camel_case() {
        let v = serde_json::to_value(ReleaseOutcome::DeadLetter).unwrap();
        assert_eq!(v, serde_json::json!({"type": "deadLetter"}));

        let v = serde_json::to_value(ReleaseOutcome::requeue_after(Duration::from_secs(5))).unwrap();
        assert_eq!(v, serde_json::json!({"type": "requeueAfter", "delayMs": 5000}));

        let back: ReleaseOutcome =
            serde_json::from_value(serde_json::json!({"type": "commit"})).unwrap();
        assert_eq!(back, ReleaseOutcome::Commit);
    }

    #[rstest]
    #[case(MessageProcessingResult::Success, ProcessingResult::Success)]
    #[case(MessageProcessingResult::Retry, ProcessingResult::Retry)]
    #[case(MessageProcessingResult::BadMessage, ProcessingResult::BadMessage)]
    fn handler_results_map_one_to_one(
        #[case] from: MessageProcessingResult,
        #[case] to: ProcessingResult,
    ) {
        let mapped: ProcessingResult = from.into();
        assert_eq!(mapped, to);
        assert!(!mapped.is_failure());
    }

    #[test]
    fn framework_results_are_failures() {
        assert!(ProcessingResult::UnhandledException("boom".into()).is_failure());
        assert!(ProcessingResult::Invalid("?".into()).is_failure());
    }
}
