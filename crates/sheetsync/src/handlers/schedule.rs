//! Schedule handler.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sheetsync_core::schedule::{filter_events, DateRange, EventRecord};

use crate::{handlers::AppError, state::AppState};

/// Query parameters for the schedule endpoint.
#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    /// Force a refresh from the source before answering
    #[serde(default)]
    pub refresh: bool,
    /// First day to include (ISO 8601: YYYY-MM-DD)
    pub start_date: Option<NaiveDate>,
    /// Last day to include (ISO 8601: YYYY-MM-DD)
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
    pub events: Vec<EventRecord>,
}

/// GET /schedule - Events of the current snapshot, optionally filtered by date.
#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>, AppError> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        DateRange::new(start, end)?;
    }

    let snapshot = state.service.get_schedule(query.refresh).await?;
    let events = filter_events(&snapshot.events, query.start_date, query.end_date)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ScheduleResponse {
        version: snapshot.version,
        fetched_at: snapshot.fetched_at,
        events,
    }))
}
