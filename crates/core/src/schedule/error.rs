use thiserror::Error;

/// Errors that can occur when constructing a date range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Invalid date range: start date must be before or equal to end date")]
    InvalidRange,
}

/// Errors produced while fetching, parsing or serving the schedule.
///
/// Cloneable so that the outcome of one refresh can be handed to every
/// caller waiting on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Malformed schedule source: {0}")]
    MalformedSource(String),
    #[error("No schedule data available: {0}")]
    NoDataAvailable(String),
    #[error("Schedule refresh timed out after {0}ms")]
    RefreshTimeout(u64),
    #[error("Schedule service is shutting down")]
    ShuttingDown,
}

/// Result type for schedule operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_error_display() {
        assert_eq!(
            DateRangeError::InvalidRange.to_string(),
            "Invalid date range: start date must be before or equal to end date"
        );
    }

    #[test]
    fn test_source_unavailable_display() {
        let error = ScheduleError::SourceUnavailable("quota exceeded".to_string());
        assert_eq!(
            error.to_string(),
            "Schedule source unavailable: quota exceeded"
        );
    }

    #[test]
    fn test_malformed_source_display() {
        let error = ScheduleError::MalformedSource("no month header".to_string());
        assert_eq!(
            error.to_string(),
            "Malformed schedule source: no month header"
        );
    }

    #[test]
    fn test_no_data_available_display() {
        let error = ScheduleError::NoDataAvailable("first fetch failed".to_string());
        assert_eq!(
            error.to_string(),
            "No schedule data available: first fetch failed"
        );
    }

    #[test]
    fn test_refresh_timeout_display() {
        let error = ScheduleError::RefreshTimeout(15_000);
        assert_eq!(error.to_string(), "Schedule refresh timed out after 15000ms");
    }
}
