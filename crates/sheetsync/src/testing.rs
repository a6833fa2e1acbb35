//! Shared fixtures for the shell's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use sheetsync_core::schedule::{GridFetcher, MonthBlockParser, RawGrid, Result, ScheduleError};

pub const TEST_YEAR: i32 = 2025;

pub fn parser() -> Arc<MonthBlockParser> {
    Arc::new(MonthBlockParser::new(TEST_YEAR))
}

/// January 2025 with three events on days 1 and 2.
pub fn sample_grid() -> RawGrid {
    vec![
        vec!["", "ЯНВАРЬ"],
        vec![],
        vec!["", "1", "2"],
        vec!["Meeting", "Kickoff", "Retro"],
        vec!["Design", "", "Sketches"],
    ]
    .into_iter()
    .collect()
}

/// A single event on 2025-03-01 with the given text.
pub fn single_event_grid(text: &str) -> RawGrid {
    vec![
        vec!["".to_string(), "МАРТ".to_string()],
        vec![],
        vec!["".to_string(), "1".to_string()],
        vec!["Meeting".to_string(), text.to_string()],
    ]
    .into_iter()
    .collect()
}

/// Fetcher that counts calls and replays queued outcomes.
///
/// Once the queue is empty every fetch returns the fallback grid. A gated
/// fetcher waits for one semaphore permit per fetch.
pub struct ScriptedFetcher {
    calls: AtomicUsize,
    outcomes: Mutex<VecDeque<Result<RawGrid>>>,
    fallback: RawGrid,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    pub fn new(fallback: RawGrid) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcomes: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            gate: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push(&self, outcome: Result<RawGrid>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GridFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<RawGrid> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| ScheduleError::SourceUnavailable("gate closed".to_string()))?
                .forget();
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let queued = self.outcomes.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
