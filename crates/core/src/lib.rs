//! Functional core of sheetsync.
//!
//! Pure types and functions shared by the HTTP server and the notifier:
//! event records, the grid parser, the error taxonomy and its HTTP mapping,
//! and version-based change detection. Nothing in this crate performs I/O.

pub mod notify;
pub mod schedule;
