use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::DateRangeError;

/// One calendar entry read from the schedule grid.
///
/// Identity is structural: two records with the same date, activity and text
/// are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    /// Row label of the grid (the activity or project name).
    pub activity: String,
    /// Free-form cell content.
    pub text: String,
}

impl EventRecord {
    pub fn new(date: NaiveDate, activity: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            date,
            activity: activity.into(),
            text: text.into(),
        }
    }
}

/// Raw cell values of the schedule worksheet, row-major.
///
/// Rows may have different lengths; missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGrid {
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the trimmed cell value, or `""` when the cell does not exist.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.trim())
            .unwrap_or("")
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for RawGrid {
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// One immutable view of the schedule as of a single fetch+parse cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSnapshot {
    /// Strictly increasing per cache instance, starting at 1.
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
    /// Events in source grid order.
    pub events: Vec<EventRecord>,
}

impl ScheduleSnapshot {
    pub fn new(version: u64, fetched_at: DateTime<Utc>, events: Vec<EventRecord>) -> Self {
        Self {
            version,
            fetched_at,
            events,
        }
    }

    /// Returns true when the snapshot is older than `max_age` at `now`.
    ///
    /// A `max_age` too large to represent never expires.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        TimeDelta::from_std(max_age)
            .map(|max_age| now.signed_duration_since(self.fetched_at) > max_age)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A date range with inclusive start and end dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range, validating that start <= end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
