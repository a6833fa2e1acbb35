use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use sheetsync_core::schedule::{EventParser, GridFetcher, Result, ScheduleError, ScheduleSnapshot};

use super::SnapshotCell;

type Outcome = Result<Arc<ScheduleSnapshot>>;
type OutcomeReceiver = watch::Receiver<Option<Outcome>>;

/// The refresh cycle currently running, if any.
struct InFlight {
    id: u64,
    outcome: OutcomeReceiver,
}

#[derive(Default)]
struct Gate {
    in_flight: Option<InFlight>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
    next_id: u64,
}

struct Shared {
    fetcher: Arc<dyn GridFetcher>,
    parser: Arc<dyn EventParser>,
    cell: Arc<SnapshotCell>,
    fetch_timeout: Duration,
    // Never held across an await.
    gate: Mutex<Gate>,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One fetch+parse+install cycle. Nothing is installed on failure.
    async fn refresh_once(&self) -> Outcome {
        let fetched_at = Utc::now();

        let grid = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| ScheduleError::RefreshTimeout(duration_ms(self.fetch_timeout)))??;

        let events = self.parser.parse(&grid)?;

        Ok(self.cell.install(events, fetched_at))
    }
}

/// Single-flight refresh of the snapshot cell.
///
/// While a cycle runs, every new request joins it instead of starting another
/// fetch, and all joiners observe the same outcome. A cycle runs on its own
/// task, so it completes even when every caller has stopped waiting.
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
    join_timeout: Duration,
    started: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        fetcher: Arc<dyn GridFetcher>,
        parser: Arc<dyn EventParser>,
        cell: Arc<SnapshotCell>,
        fetch_timeout: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                parser,
                cell,
                fetch_timeout,
                gate: Mutex::new(Gate::default()),
            }),
            join_timeout,
            started: AtomicU64::new(0),
        }
    }

    /// Starts a refresh cycle or joins the one in flight, then waits for it.
    ///
    /// Waiting is bounded by the join timeout. A caller that gives up gets
    /// [`ScheduleError::RefreshTimeout`] while the cycle keeps running.
    pub async fn request_refresh(&self) -> Outcome {
        let mut outcome = self.start_or_join()?;

        let waited = tokio::time::timeout(self.join_timeout, outcome.wait_for(Option::is_some)).await;

        match waited {
            Ok(Ok(ready)) => ready.clone().unwrap_or_else(|| {
                Err(ScheduleError::SourceUnavailable(
                    "refresh finished without an outcome".to_string(),
                ))
            }),
            Ok(Err(_)) => Err(ScheduleError::SourceUnavailable(
                "refresh task aborted".to_string(),
            )),
            Err(_) => {
                tracing::warn!(
                    join_timeout_ms = duration_ms(self.join_timeout),
                    "Gave up waiting for schedule refresh"
                );
                Err(ScheduleError::RefreshTimeout(duration_ms(self.join_timeout)))
            }
        }
    }

    /// Starts a refresh cycle unless one is already running. Does not wait.
    pub fn trigger(&self) -> Result<()> {
        self.start_or_join().map(drop)
    }

    pub fn is_refreshing(&self) -> bool {
        self.shared.gate().in_flight.is_some()
    }

    /// Number of fetch cycles started so far.
    pub fn refreshes_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Rejects new refreshes and waits for the running cycle to finish.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        let tasks = {
            let mut gate = self.shared.gate();
            gate.closed = true;
            std::mem::take(&mut gate.tasks)
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Schedule refresh task ended abnormally");
            }
        }
    }

    /// Decides start-vs-join atomically under the gate lock.
    fn start_or_join(&self) -> Result<OutcomeReceiver> {
        let mut gate = self.shared.gate();

        if gate.closed {
            return Err(ScheduleError::ShuttingDown);
        }

        if let Some(in_flight) = &gate.in_flight {
            tracing::trace!(cycle = in_flight.id, "Joining schedule refresh in flight");
            return Ok(in_flight.outcome.clone());
        }

        gate.next_id += 1;
        let id = gate.next_id;
        let (tx, rx) = watch::channel(None);
        gate.in_flight = Some(InFlight {
            id,
            outcome: rx.clone(),
        });
        gate.tasks.retain(|task| !task.is_finished());
        gate.tasks
            .push(tokio::spawn(run_cycle(Arc::clone(&self.shared), id, tx)));
        self.started.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(cycle = id, "Started schedule refresh");
        Ok(rx)
    }
}

/// The in-flight slot of one cycle and the sender joiners wait on.
///
/// Dropping it releases the slot before the sender closes, so a cycle that
/// panics never leaves later requests joined to a dead receiver.
struct CycleSlot {
    shared: Arc<Shared>,
    id: u64,
    outcome: watch::Sender<Option<Outcome>>,
}

impl CycleSlot {
    fn release(&self) {
        let mut gate = self.shared.gate();
        if gate.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            gate.in_flight = None;
        }
    }

    /// Joiners arriving after this point start a new cycle.
    fn publish(self, outcome: Outcome) {
        self.release();
        self.outcome.send_replace(Some(outcome));
    }
}

impl Drop for CycleSlot {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_cycle(shared: Arc<Shared>, id: u64, tx: watch::Sender<Option<Outcome>>) {
    let slot = CycleSlot {
        shared: Arc::clone(&shared),
        id,
        outcome: tx,
    };
    let started = Instant::now();
    let outcome = shared.refresh_once().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &outcome {
        Ok(snapshot) => tracing::info!(
            cycle = id,
            version = snapshot.version,
            events = snapshot.len(),
            elapsed_ms,
            "Schedule refreshed"
        ),
        Err(e) => tracing::warn!(
            cycle = id,
            error = %e,
            elapsed_ms,
            "Schedule refresh failed, keeping previous snapshot"
        ),
    }

    slot.publish(outcome);
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parser, sample_grid, ScriptedFetcher};
    use futures_util::future::join_all;
    use tokio::sync::Semaphore;

    fn coordinator(fetcher: Arc<ScriptedFetcher>) -> (RefreshCoordinator, Arc<SnapshotCell>) {
        let cell = Arc::new(SnapshotCell::default());
        let coordinator = RefreshCoordinator::new(
            fetcher,
            parser(),
            Arc::clone(&cell),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        (coordinator, cell)
    }

    #[tokio::test]
    async fn test_request_refresh_installs_snapshot() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let (coordinator, cell) = coordinator(Arc::clone(&fetcher));

        let snapshot = coordinator.request_refresh().await.unwrap();

        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(cell.load().unwrap().version, 1);
        assert_eq!(fetcher.calls(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(50)),
        );
        let (coordinator, _cell) = coordinator(Arc::clone(&fetcher));

        let results = join_all((0..20).map(|_| coordinator.request_refresh())).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(coordinator.refreshes_started(), 1);
        for result in results {
            assert_eq!(result.unwrap().version, 1);
        }
    }

    #[tokio::test]
    async fn test_joiners_share_failure() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(20)),
        );
        fetcher.push(Err(ScheduleError::SourceUnavailable("down".to_string())));
        let (coordinator, cell) = coordinator(Arc::clone(&fetcher));

        let results = join_all((0..5).map(|_| coordinator.request_refresh())).await;

        assert_eq!(fetcher.calls(), 1);
        for result in results {
            assert_eq!(
                result.unwrap_err(),
                ScheduleError::SourceUnavailable("down".to_string())
            );
        }
        assert!(cell.load().is_none());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_increase_version() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let (coordinator, _cell) = coordinator(Arc::clone(&fetcher));

        let first = coordinator.request_refresh().await.unwrap();
        let second = coordinator.request_refresh().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_previous_snapshot() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let (coordinator, cell) = coordinator(Arc::clone(&fetcher));
        coordinator.request_refresh().await.unwrap();

        fetcher.push(Ok(vec![vec!["no months here"]].into_iter().collect()));
        let err = coordinator.request_refresh().await.unwrap_err();

        assert!(matches!(err, ScheduleError::MalformedSource(_)));
        assert_eq!(cell.load().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(500)),
        );
        let cell = Arc::new(SnapshotCell::default());
        let coordinator = RefreshCoordinator::new(
            fetcher,
            parser(),
            Arc::clone(&cell),
            Duration::from_millis(20),
            Duration::from_secs(5),
        );

        let err = coordinator.request_refresh().await.unwrap_err();

        assert_eq!(err, ScheduleError::RefreshTimeout(20));
        assert!(cell.load().is_none());
    }

    #[tokio::test]
    async fn test_join_timeout_leaves_cycle_running() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()).gated(Arc::clone(&gate)));
        let cell = Arc::new(SnapshotCell::default());
        let coordinator = RefreshCoordinator::new(
            fetcher,
            parser(),
            Arc::clone(&cell),
            Duration::from_secs(5),
            Duration::from_millis(20),
        );

        let err = coordinator.request_refresh().await.unwrap_err();
        assert_eq!(err, ScheduleError::RefreshTimeout(20));
        assert!(coordinator.is_refreshing());

        gate.add_permits(1);
        coordinator.shutdown().await;

        assert_eq!(cell.load().unwrap().version, 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_trigger_does_not_wait() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()).gated(Arc::clone(&gate)));
        let (coordinator, cell) = coordinator(Arc::clone(&fetcher));

        coordinator.trigger().unwrap();
        coordinator.trigger().unwrap();

        assert!(coordinator.is_refreshing());
        assert!(cell.load().is_none());
        assert_eq!(coordinator.refreshes_started(), 1);

        gate.add_permits(1);
        let snapshot = coordinator.request_refresh().await.unwrap();
        assert_eq!(snapshot.version, 1);
    }

    /// Panics on the first fetch, then serves the sample grid.
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl GridFetcher for PanicsOnce {
        async fn fetch(&self) -> Result<sheetsync_core::schedule::RawGrid> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("fetcher bug");
            }
            Ok(sample_grid())
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_block_later_refreshes() {
        let fetcher = Arc::new(PanicsOnce::default());
        let cell = Arc::new(SnapshotCell::default());
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&fetcher) as Arc<dyn GridFetcher>,
            parser(),
            Arc::clone(&cell),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        let first = coordinator.request_refresh().await;
        assert!(matches!(first, Err(ScheduleError::SourceUnavailable(_))));
        assert!(!coordinator.is_refreshing());

        let snapshot = coordinator.request_refresh().await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.refreshes_started(), 2);
        assert_eq!(cell.load().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_and_rejects_new() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(50)),
        );
        let (coordinator, cell) = coordinator(Arc::clone(&fetcher));

        coordinator.trigger().unwrap();
        coordinator.shutdown().await;

        assert_eq!(cell.load().unwrap().version, 1);
        assert_eq!(
            coordinator.request_refresh().await.unwrap_err(),
            ScheduleError::ShuttingDown
        );
        assert_eq!(coordinator.trigger(), Err(ScheduleError::ShuttingDown));
        assert_eq!(fetcher.calls(), 1);

        // Second shutdown is a no-op.
        coordinator.shutdown().await;
    }
}
