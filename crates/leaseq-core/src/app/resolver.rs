//! Outcome resolver: `ProcessingResult` -> store mutation.

use std::time::Duration;

use crate::domain::{ProcessingResult, ReleaseOutcome};

/// Map what happened in the handler to what the store should do.
///
/// Failures (`UnhandledException`, `Invalid`) retry exactly like `Retry`;
/// the difference is only in how they are counted and logged.
pub fn resolve(result: &ProcessingResult, retry_delay: Duration) -> ReleaseOutcome {
    match result {
        ProcessingResult::Success => ReleaseOutcome::Commit,
        ProcessingResult::BadMessage => ReleaseOutcome::DeadLetter,
        ProcessingResult::Retry
        | ProcessingResult::UnhandledException(_)
        | ProcessingResult::Invalid(_) => ReleaseOutcome::requeue_after(retry_delay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DELAY: Duration = Duration::from_secs(5);

    #[rstest]
    #[case(ProcessingResult::Success, ReleaseOutcome::Commit)]
    #[case(ProcessingResult::BadMessage, ReleaseOutcome::DeadLetter)]
    #[case(ProcessingResult::Retry, ReleaseOutcome::requeue_after(DELAY))]
    #[case(
        ProcessingResult::UnhandledException("boom".into()),
        ReleaseOutcome::requeue_after(DELAY)
    )]
    #[case(ProcessingResult::Invalid("?".into()), ReleaseOutcome::requeue_after(DELAY))]
    fn resolves_every_result(#[case] result: ProcessingResult, #[case] expected: ReleaseOutcome) {
        assert_eq!(resolve(&result, DELAY), expected);
    }
}
