use async_trait::async_trait;

use super::{EventRecord, RawGrid, Result};

/// Source of the raw schedule grid.
///
/// Implementations own their connection/session. Transient failures
/// (network, auth, quota) are reported as `ScheduleError::SourceUnavailable`.
#[async_trait]
pub trait GridFetcher: Send + Sync {
    /// Retrieves the current contents of the schedule worksheet.
    async fn fetch(&self) -> Result<RawGrid>;
}

/// Maps a raw grid into ordered event records.
///
/// Deterministic and pure. Either the whole grid parses or the call fails
/// with `ScheduleError::MalformedSource`.
pub trait EventParser: Send + Sync {
    fn parse(&self, grid: &RawGrid) -> Result<Vec<EventRecord>>;
}
