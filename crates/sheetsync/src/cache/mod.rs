//! Read-through schedule cache.
//!
//! - [`ScheduleCache`]: serves the current snapshot and refreshes it when stale
//! - [`RefreshCoordinator`]: runs at most one fetch+parse cycle at a time and
//!   lets concurrent callers join it
//!
//! The current snapshot lives behind a [`SnapshotCell`]. Readers clone an
//! `Arc` under a short read lock, so a refresh in flight never blocks them.

mod cell;
mod coordinator;
mod schedule_cache;

pub(crate) use cell::SnapshotCell;
pub use coordinator::RefreshCoordinator;
pub use schedule_cache::ScheduleCache;
