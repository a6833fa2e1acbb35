//! Change detection and message formatting for schedule notifications.
//!
//! The notifier compares snapshot versions instead of snapshot contents; a new
//! version means a new successful fetch+parse cycle was installed.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::schedule::{upcoming_events, ScheduleSnapshot};

/// Number of days covered by the digest.
pub const DIGEST_DAYS: u32 = 7;

/// Remembers the version of the last snapshot that was delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    last_delivered: Option<u64>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    /// Returns true when `snapshot` has not been delivered yet.
    pub fn has_changed(&self, snapshot: &ScheduleSnapshot) -> bool {
        self.last_delivered != Some(snapshot.version)
    }

    /// Records a successful delivery of `version`.
    pub fn mark_delivered(&mut self, version: u64) {
        self.last_delivered = Some(version);
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Formats the "schedule changed" message for `snapshot` as seen on `today`.
pub fn format_digest(snapshot: &ScheduleSnapshot, today: NaiveDate) -> String {
    let mut message = format!(
        "<b>Schedule updated</b> (version {}, {} events)",
        snapshot.version,
        snapshot.len()
    );

    let upcoming = upcoming_events(&snapshot.events, today, DIGEST_DAYS);
    if upcoming.is_empty() {
        let _ = write!(message, "\n\nNo events in the next {DIGEST_DAYS} days.");
        return message;
    }

    let _ = write!(message, "\n\nNext {DIGEST_DAYS} days:");
    let mut current: Option<NaiveDate> = None;
    for event in upcoming {
        if current != Some(event.date) {
            let _ = write!(message, "\n<b>{}</b>", event.date.format("%Y-%m-%d"));
            current = Some(event.date);
        }
        let _ = write!(
            message,
            "\n• {}: {}",
            escape_html(&event.activity),
            escape_html(&event.text)
        );
    }

    message
}
