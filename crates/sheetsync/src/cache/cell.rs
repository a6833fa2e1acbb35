use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use sheetsync_core::schedule::{EventRecord, ScheduleSnapshot};

/// Holder of the current snapshot.
///
/// Versions are assigned under the write lock, so they increase strictly
/// with every install. A snapshot once installed is never mutated.
#[derive(Debug, Default)]
pub(crate) struct SnapshotCell {
    current: RwLock<Option<Arc<ScheduleSnapshot>>>,
}

impl SnapshotCell {
    pub(crate) fn load(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes a new snapshot built from `events` and returns it.
    pub(crate) fn install(
        &self,
        events: Vec<EventRecord>,
        fetched_at: DateTime<Utc>,
    ) -> Arc<ScheduleSnapshot> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let version = current.as_ref().map_or(1, |s| s.version + 1);
        let snapshot = Arc::new(ScheduleSnapshot::new(version, fetched_at, events));
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }
}
