//! Admin notifications about schedule changes.
//!
//! A background loop polls the [`ScheduleService`] and delivers a digest to a
//! [`NotificationSink`] whenever a new snapshot version shows up. Delivery is
//! best effort: failures are logged and retried on the next tick.

mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use sheetsync_core::notify::{format_digest, ChangeTracker};

use crate::service::ScheduleService;

pub use telegram::TelegramSink;

/// Sent once when the process comes up.
pub const STARTUP_MESSAGE: &str = "🤖 Bot and API server started";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Notification API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Notification was not delivered to any of {0} recipients")]
    Undelivered(usize),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// Destination for admin notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Writes notifications to the log. Used when no bot token is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, text: &str) -> Result<()> {
        tracing::info!(text = %text, "Notification");
        Ok(())
    }
}

/// Delivers a digest if the current snapshot has not been delivered yet.
///
/// Returns true when a digest was delivered.
pub async fn notify_if_changed(
    service: &ScheduleService,
    sink: &dyn NotificationSink,
    tracker: &mut ChangeTracker,
) -> bool {
    let snapshot = match service.get_schedule(false).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "Notifier could not read the schedule");
            return false;
        }
    };

    if !tracker.has_changed(&snapshot) {
        return false;
    }

    let message = format_digest(&snapshot, Utc::now().date_naive());
    match sink.deliver(&message).await {
        Ok(()) => {
            tracker.mark_delivered(snapshot.version);
            tracing::info!(version = snapshot.version, "Schedule change notified");
            true
        }
        Err(e) => {
            tracing::warn!(version = snapshot.version, error = %e, "Schedule change notification failed");
            false
        }
    }
}

/// Runs the notifier until `shutdown` fires.
pub async fn run_notifier(
    service: Arc<ScheduleService>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    if let Err(e) = sink.deliver(STARTUP_MESSAGE).await {
        tracing::warn!(error = %e, "Startup notification failed");
    }

    let mut tracker = ChangeTracker::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                notify_if_changed(&service, sink.as_ref(), &mut tracker).await;
            }
        }
    }

    tracing::info!("Notifier stopped");
}
