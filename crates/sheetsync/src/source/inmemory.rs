//! Fixed in-memory grid source.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};

use sheetsync_core::schedule::{month_name, GridFetcher, RawGrid, Result};

/// Serves the same grid on every fetch.
#[derive(Debug, Clone)]
pub struct StaticGridFetcher {
    grid: RawGrid,
}

impl StaticGridFetcher {
    pub fn new(grid: RawGrid) -> Self {
        Self { grid }
    }
}

#[async_trait]
impl GridFetcher for StaticGridFetcher {
    async fn fetch(&self) -> Result<RawGrid> {
        Ok(self.grid.clone())
    }
}

/// Builds a one-month worksheet around `today` for demonstration purposes.
pub fn demo_grid(today: NaiveDate) -> RawGrid {
    let first = today.with_day(1).unwrap_or(today);
    let days: Vec<NaiveDate> = first
        .iter_days()
        .take_while(|date| date.month() == first.month())
        .collect();

    let header = month_name(today.month()).unwrap_or_default();
    let row_for = |label: &str, cell: &dyn Fn(NaiveDate) -> Option<&'static str>| {
        std::iter::once(label.to_string())
            .chain(
                days.iter()
                    .map(|date| cell(*date).unwrap_or_default().to_string()),
            )
            .collect::<Vec<String>>()
    };

    let review_day = today.succ_opt().and_then(|d| d.succ_opt());

    vec![
        vec![String::new(), header.to_string()],
        Vec::new(),
        std::iter::once(String::new())
            .chain(days.iter().map(|date| date.day().to_string()))
            .collect(),
        row_for("Team sync", &|date| {
            (date.weekday() == Weekday::Mon).then_some("Weekly planning")
        }),
        row_for("Releases", &|date| {
            (date.day() == 15).then_some("Monthly release")
        }),
        row_for("Reviews", &|date| {
            (Some(date) == review_day).then_some("Design review")
        }),
        row_for("Office", &|date| {
            (date.weekday() == Weekday::Fri).then_some("Demo day")
        }),
    ]
    .into_iter()
    .collect()
}
