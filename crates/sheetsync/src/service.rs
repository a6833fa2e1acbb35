//! Schedule service facade over the read-through cache.
//!
//! Owns the cache, the optional warm-up refresh loop and the lifecycle that
//! the health endpoint reports.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use sheetsync_core::schedule::{EventParser, GridFetcher, Result, ScheduleSnapshot};

use crate::cache::ScheduleCache;
use crate::config::Config;

/// Externally visible state of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Constructed, not started.
    Uninitialized,
    /// Started, no snapshot yet.
    Initializing,
    Ready,
    /// Serving a snapshot while a refresh is in flight.
    Refreshing,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Started,
    ShuttingDown,
    Stopped,
}

/// Tunables of the service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub max_age: Duration,
    pub fetch_timeout: Duration,
    pub join_timeout: Duration,
    pub eager_refresh: bool,
    pub refresh_interval: Option<Duration>,
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_age: config.max_age(),
            fetch_timeout: config.fetch_timeout(),
            join_timeout: config.join_timeout(),
            eager_refresh: config.eager_refresh,
            refresh_interval: config.refresh_interval(),
        }
    }
}

struct WarmupLoop {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Entry point for everything that needs the schedule.
pub struct ScheduleService {
    cache: Arc<ScheduleCache>,
    options: ServiceOptions,
    phase: Mutex<Phase>,
    warmup: Mutex<Option<WarmupLoop>>,
}

impl ScheduleService {
    pub fn new(
        fetcher: Arc<dyn GridFetcher>,
        parser: Arc<dyn EventParser>,
        options: ServiceOptions,
    ) -> Self {
        let cache = ScheduleCache::new(fetcher, parser, options.fetch_timeout, options.join_timeout);
        Self {
            cache: Arc::new(cache),
            options,
            phase: Mutex::new(Phase::Created),
            warmup: Mutex::new(None),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts background work. Calling it more than once has no effect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        // Held until the warm-up loop is stored, so a concurrent `stop` either
        // sees `Created` or finds the loop to stop.
        let mut phase = self.phase();
        if *phase != Phase::Created {
            tracing::debug!(phase = ?*phase, "Schedule service already started");
            return;
        }
        *phase = Phase::Started;

        if self.options.eager_refresh {
            if let Err(e) = self.cache.coordinator().trigger() {
                tracing::warn!(error = %e, "Could not start initial schedule refresh");
            }
        }

        if let Some(interval) = self.options.refresh_interval {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = tokio::spawn(warmup_loop(
                Arc::clone(&self.cache),
                self.options.max_age,
                interval,
                stop_rx,
            ));
            *self.warmup.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(WarmupLoop { stop_tx, handle });
        }
        drop(phase);

        tracing::info!(
            eager_refresh = self.options.eager_refresh,
            max_age_secs = self.options.max_age.as_secs(),
            "Schedule service started"
        );
    }

    /// Returns the schedule, refreshing it first when stale or forced.
    pub async fn get_schedule(&self, force_refresh: bool) -> Result<Arc<ScheduleSnapshot>> {
        self.cache
            .ensure_fresh(self.options.max_age, force_refresh)
            .await
    }

    /// Current snapshot without triggering a refresh.
    pub fn current(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.cache.read()
    }

    /// Number of fetch cycles started since construction.
    pub fn refreshes_started(&self) -> u64 {
        self.cache.coordinator().refreshes_started()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match *self.phase() {
            Phase::Created => Lifecycle::Uninitialized,
            Phase::ShuttingDown => Lifecycle::ShuttingDown,
            Phase::Stopped => Lifecycle::Stopped,
            Phase::Started => match (
                self.cache.read().is_some(),
                self.cache.coordinator().is_refreshing(),
            ) {
                (false, _) => Lifecycle::Initializing,
                (true, false) => Lifecycle::Ready,
                (true, true) => Lifecycle::Refreshing,
            },
        }
    }

    /// Stops background work and waits for an in-flight refresh to finish.
    ///
    /// Later refreshes fail with `ShuttingDown`; fresh snapshots are still
    /// served. Idempotent.
    pub async fn stop(&self) {
        {
            let mut phase = self.phase();
            if matches!(*phase, Phase::ShuttingDown | Phase::Stopped) {
                return;
            }
            *phase = Phase::ShuttingDown;
        }
        tracing::info!("Schedule service shutting down");

        let warmup = self
            .warmup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|WarmupLoop { stop_tx, handle }| {
                let _ = stop_tx.send(());
                handle
            });

        self.cache.coordinator().shutdown().await;

        if let Some(handle) = warmup {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Warm-up refresh loop ended abnormally");
            }
        }

        *self.phase() = Phase::Stopped;
        tracing::info!("Schedule service stopped");
    }
}

/// Refreshes the snapshot whenever it has gone stale, once per `interval`.
async fn warmup_loop(
    cache: Arc<ScheduleCache>,
    max_age: Duration,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if let Err(e) = cache.ensure_fresh(max_age, false).await {
                    tracing::warn!(error = %e, "Periodic schedule refresh failed");
                }
            }
        }
    }

    tracing::debug!("Warm-up refresh loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parser, sample_grid, single_event_grid, ScriptedFetcher};
    use futures_util::future::join_all;
    use sheetsync_core::schedule::{filter_events, ScheduleError};
    use tokio::sync::Semaphore;

    fn options() -> ServiceOptions {
        ServiceOptions {
            max_age: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
            eager_refresh: false,
            refresh_interval: None,
        }
    }

    fn service(fetcher: Arc<ScriptedFetcher>, options: ServiceOptions) -> ScheduleService {
        ScheduleService::new(fetcher, parser(), options)
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()).gated(Arc::clone(&gate)));
        let service = service(
            fetcher,
            ServiceOptions {
                eager_refresh: true,
                ..options()
            },
        );

        assert_eq!(service.lifecycle(), Lifecycle::Uninitialized);

        service.start();
        assert_eq!(service.lifecycle(), Lifecycle::Initializing);

        gate.add_permits(1);
        service.get_schedule(false).await.unwrap();
        assert_eq!(service.lifecycle(), Lifecycle::Ready);

        service.cache.coordinator().trigger().unwrap();
        assert_eq!(service.lifecycle(), Lifecycle::Refreshing);

        gate.add_permits(1);
        service.stop().await;
        assert_eq!(service.lifecycle(), Lifecycle::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_start_and_stop_leave_no_warmup_loop() {
        for _ in 0..50 {
            let service = Arc::new(service(
                Arc::new(ScriptedFetcher::new(sample_grid())),
                ServiceOptions {
                    refresh_interval: Some(Duration::from_millis(5)),
                    ..options()
                },
            ));

            let starter = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.start() })
            };
            let stopper = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.stop().await })
            };
            starter.await.unwrap();
            stopper.await.unwrap();

            assert!(service.warmup.lock().unwrap().is_none());
            assert_eq!(service.lifecycle(), Lifecycle::Stopped);
        }
    }

    #[tokio::test]
    async fn test_eager_refresh_on_start() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let service = service(
            Arc::clone(&fetcher),
            ServiceOptions {
                eager_refresh: true,
                ..options()
            },
        );

        service.start();
        service.start();
        let snapshot = service.get_schedule(false).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn test_lazy_without_eager_refresh() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let service = service(Arc::clone(&fetcher), options());

        service.start();
        tokio::task::yield_now().await;

        assert_eq!(fetcher.calls(), 0);
        assert!(service.current().is_none());

        service.get_schedule(false).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_waits_for_refresh_and_rejects_new_ones() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(50)),
        );
        let service = service(
            Arc::clone(&fetcher),
            ServiceOptions {
                eager_refresh: true,
                ..options()
            },
        );

        service.start();
        service.stop().await;

        assert_eq!(service.current().unwrap().version, 1);
        assert_eq!(service.get_schedule(false).await.unwrap().version, 1);
        assert_eq!(
            service.get_schedule(true).await.unwrap_err(),
            ScheduleError::ShuttingDown
        );
        assert_eq!(fetcher.calls(), 1);

        service.stop().await;
        assert_eq!(service.lifecycle(), Lifecycle::Stopped);
    }

    #[tokio::test]
    async fn test_warmup_loop_refreshes_stale_snapshot() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let service = service(
            Arc::clone(&fetcher),
            ServiceOptions {
                max_age: Duration::ZERO,
                refresh_interval: Some(Duration::from_millis(10)),
                ..options()
            },
        );

        service.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.stop().await;

        assert!(fetcher.calls() >= 2);
        assert!(service.current().unwrap().version >= 2);
    }

    #[tokio::test]
    async fn test_warm_cache_concurrent_readers_fetch_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::new(sample_grid()));
        let service = service(Arc::clone(&fetcher), options());
        service.get_schedule(false).await.unwrap();

        let snapshots = join_all((0..100).map(|_| service.get_schedule(false))).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(snapshots.into_iter().all(|s| s.unwrap().version == 1));
    }

    #[tokio::test]
    async fn test_forced_refreshes_during_outage_keep_serving_last_good() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(sample_grid()).with_delay(Duration::from_millis(20)),
        );
        let service = service(Arc::clone(&fetcher), options());
        let good = service.get_schedule(false).await.unwrap();

        fetcher.push(Err(ScheduleError::SourceUnavailable("outage".to_string())));
        let results = join_all((0..10).map(|_| service.get_schedule(true))).await;

        assert_eq!(fetcher.calls(), 2);
        for result in results {
            assert_eq!(
                result.unwrap_err(),
                ScheduleError::SourceUnavailable("outage".to_string())
            );
        }
        assert!(Arc::ptr_eq(&service.current().unwrap(), &good));
        assert_eq!(service.get_schedule(false).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_date_filtered_view_of_refreshed_schedule() {
        let fetcher = Arc::new(ScriptedFetcher::new(single_event_grid("Kickoff")));
        let service = service(fetcher, options());

        let snapshot = service.get_schedule(true).await.unwrap();
        let march = chrono::NaiveDate::from_ymd_opt(2025, 3, 1);

        assert_eq!(filter_events(&snapshot.events, march, march).len(), 1);
        assert!(filter_events(&snapshot.events, None, chrono::NaiveDate::from_ymd_opt(2025, 2, 28))
            .is_empty());
    }
}
