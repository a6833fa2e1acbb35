//! Pure functions for mapping schedule errors to HTTP responses.
//!
//! The boundary distinguishes retryable failures (the source is flaky or
//! slow) from non-retryable ones (the source is broken, or nothing has ever
//! been loaded).

use super::ScheduleError;

/// Maps a [`ScheduleError`] to an HTTP status code.
///
/// - `SourceUnavailable` -> 503 (Service Unavailable)
/// - `RefreshTimeout` -> 504 (Gateway Timeout)
/// - `ShuttingDown` -> 503 (Service Unavailable)
/// - `MalformedSource` -> 502 (Bad Gateway)
/// - `NoDataAvailable` -> 424 (Failed Dependency), nothing loaded yet
///
/// # Examples
///
/// ```
/// use sheetsync_core::schedule::{ScheduleError, schedule_error_to_status_code};
///
/// let error = ScheduleError::RefreshTimeout(15_000);
/// assert_eq!(schedule_error_to_status_code(&error), 504);
/// ```
pub fn schedule_error_to_status_code(error: &ScheduleError) -> u16 {
    match error {
        ScheduleError::SourceUnavailable(_) => 503,
        ScheduleError::RefreshTimeout(_) => 504,
        ScheduleError::ShuttingDown => 503,
        ScheduleError::MalformedSource(_) => 502,
        ScheduleError::NoDataAvailable(_) => 424,
    }
}

/// Returns true when a client may retry the same request later.
pub fn is_retryable(error: &ScheduleError) -> bool {
    matches!(
        error,
        ScheduleError::SourceUnavailable(_)
            | ScheduleError::RefreshTimeout(_)
            | ScheduleError::ShuttingDown
    )
}

/// Stable machine-readable code for the error kind.
pub fn error_code(error: &ScheduleError) -> &'static str {
    match error {
        ScheduleError::SourceUnavailable(_) => "source_unavailable",
        ScheduleError::MalformedSource(_) => "malformed_source",
        ScheduleError::NoDataAvailable(_) => "no_data_available",
        ScheduleError::RefreshTimeout(_) => "refresh_timeout",
        ScheduleError::ShuttingDown => "shutting_down",
    }
}
