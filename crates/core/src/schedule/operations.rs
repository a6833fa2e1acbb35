//! Pure filters over event records.

use chrono::{Duration, NaiveDate};

use super::EventRecord;

/// Filters events by an optional inclusive date range, keeping source order.
pub fn filter_events(
    events: &[EventRecord],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<&EventRecord> {
    events
        .iter()
        .filter(|event| {
            start.is_none_or(|s| event.date >= s) && end.is_none_or(|e| event.date <= e)
        })
        .collect()
}

/// Events dated within `days` days starting at `from` (inclusive), ordered by date.
///
/// Events sharing a date keep their source order.
pub fn upcoming_events(events: &[EventRecord], from: NaiveDate, days: u32) -> Vec<&EventRecord> {
    let end = from + Duration::days(i64::from(days.saturating_sub(1)));
    let mut upcoming = filter_events(events, Some(from), Some(end));
    upcoming.sort_by_key(|event| event.date);
    upcoming
}
