use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sheetsync_core::schedule::{EventParser, GridFetcher, Result, ScheduleError, ScheduleSnapshot};

use super::{RefreshCoordinator, SnapshotCell};

/// Read-through cache over a single schedule snapshot.
pub struct ScheduleCache {
    cell: Arc<SnapshotCell>,
    coordinator: RefreshCoordinator,
}

impl ScheduleCache {
    pub fn new(
        fetcher: Arc<dyn GridFetcher>,
        parser: Arc<dyn EventParser>,
        fetch_timeout: Duration,
        join_timeout: Duration,
    ) -> Self {
        let cell = Arc::new(SnapshotCell::default());
        let coordinator =
            RefreshCoordinator::new(fetcher, parser, Arc::clone(&cell), fetch_timeout, join_timeout);
        Self { cell, coordinator }
    }

    /// Returns the current snapshot, if any. Never waits on a refresh.
    pub fn read(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.cell.load()
    }

    /// Returns a snapshot no older than `max_age`, refreshing when needed.
    ///
    /// With `force_refresh` a refresh is requested even for a fresh snapshot.
    /// A failed refresh is reported to the caller; the previous snapshot stays
    /// in place for other readers. Without any snapshot the failure becomes
    /// [`ScheduleError::NoDataAvailable`].
    pub async fn ensure_fresh(
        &self,
        max_age: Duration,
        force_refresh: bool,
    ) -> Result<Arc<ScheduleSnapshot>> {
        if !force_refresh {
            if let Some(snapshot) = self.read() {
                if !snapshot.is_stale(Utc::now(), max_age) {
                    tracing::trace!(version = snapshot.version, "Schedule cache hit");
                    return Ok(snapshot);
                }
                tracing::debug!(version = snapshot.version, "Schedule snapshot is stale");
            }
        }

        match self.coordinator.request_refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(ScheduleError::ShuttingDown) => Err(ScheduleError::ShuttingDown),
            Err(e) if self.read().is_none() => Err(ScheduleError::NoDataAvailable(e.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}
