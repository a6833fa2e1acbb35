//! Parser for the month-block schedule worksheet.
//!
//! The worksheet is a sequence of month blocks:
//!
//! ```text
//! row h     | ... ЯНВАРЬ ...             <- month header (any cell)
//! row h + 1 | (ignored)
//! row h + 2 |          | 1  | 2  | 3     <- day numbers per column
//! row h + 3 | Meeting  |    | Kickoff    <- activity rows until the next header
//! row h + 4 | Design   | Sketches |
//! ```
//!
//! Column 0 of an activity row is the activity label; every non-empty cell
//! under a day column becomes one [`EventRecord`].

use chrono::NaiveDate;

use super::{EventParser, EventRecord, RawGrid, Result, ScheduleError};

const MONTHS: [(&str, u32); 12] = [
    ("ЯНВАРЬ", 1),
    ("ФЕВРАЛЬ", 2),
    ("МАРТ", 3),
    ("АПРЕЛЬ", 4),
    ("МАЙ", 5),
    ("ИЮНЬ", 6),
    ("ИЮЛЬ", 7),
    ("АВГУСТ", 8),
    ("СЕНТЯБРЬ", 9),
    ("ОКТЯБРЬ", 10),
    ("НОЯБРЬ", 11),
    ("ДЕКАБРЬ", 12),
];

/// Returns the month number for a month header cell, ignoring case and padding.
pub fn month_number(cell: &str) -> Option<u32> {
    let name = cell.trim().to_uppercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// Returns the header name for a month number (1-12).
pub fn month_name(number: u32) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(_, n)| *n == number)
        .map(|(name, _)| *name)
}

fn month_in_row(row: &[String]) -> Option<u32> {
    row.iter().find_map(|cell| month_number(cell))
}

/// Parses the day row of a block into `(column, day)` pairs.
///
/// Column 0 holds activity labels and is never a day column.
fn day_columns(row: &[String], row_index: usize) -> Result<Vec<(usize, u32)>> {
    row.iter()
        .enumerate()
        .skip(1)
        .map(|(column, cell)| (column, cell.trim()))
        .filter(|(_, cell)| !cell.is_empty() && cell.chars().all(|c| c.is_ascii_digit()))
        .map(|(column, cell)| {
            cell.parse::<u32>().map(|day| (column, day)).map_err(|_| {
                ScheduleError::MalformedSource(format!(
                    "day number {cell:?} out of range in row {}",
                    row_index + 1
                ))
            })
        })
        .collect()
}

/// [`EventParser`] for the month-block worksheet layout.
///
/// `year` applies to the first block; the year rolls over whenever a block's
/// month is earlier than the previous block's (e.g. ДЕКАБРЬ then ЯНВАРЬ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBlockParser {
    pub year: i32,
}

impl MonthBlockParser {
    pub fn new(year: i32) -> Self {
        Self { year }
    }
}

impl EventParser for MonthBlockParser {
    fn parse(&self, grid: &RawGrid) -> Result<Vec<EventRecord>> {
        let rows = grid.rows();
        if rows.is_empty() {
            return Err(ScheduleError::MalformedSource(
                "grid has no rows".to_string(),
            ));
        }

        let mut events = Vec::new();
        let mut year = self.year;
        let mut previous_month: Option<u32> = None;
        let mut blocks = 0usize;
        let mut i = 0;

        while i < rows.len() {
            let Some(month) = month_in_row(&rows[i]) else {
                i += 1;
                continue;
            };

            if previous_month.is_some_and(|previous| month < previous) {
                year += 1;
            }
            previous_month = Some(month);
            blocks += 1;

            let day_row_index = i + 2;
            let day_row = rows.get(day_row_index).ok_or_else(|| {
                ScheduleError::MalformedSource(format!(
                    "month block at row {} has no day row",
                    i + 1
                ))
            })?;

            let days = day_columns(day_row, day_row_index)?;
            if days.is_empty() {
                return Err(ScheduleError::MalformedSource(format!(
                    "month block at row {} has no day numbers",
                    i + 1
                )));
            }

            let dates = days
                .into_iter()
                .map(|(column, day)| {
                    NaiveDate::from_ymd_opt(year, month, day)
                        .map(|date| (column, date))
                        .ok_or_else(|| {
                            ScheduleError::MalformedSource(format!(
                                "invalid date {year}-{month:02}-{day:02} in row {}",
                                day_row_index + 1
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut j = i + 3;
            while j < rows.len() && month_in_row(&rows[j]).is_none() {
                let activity = grid.cell(j, 0);
                if !activity.is_empty() {
                    for (column, date) in &dates {
                        let text = grid.cell(j, *column);
                        if !text.is_empty() {
                            events.push(EventRecord::new(*date, activity, text));
                        }
                    }
                }
                j += 1;
            }

            i = j;
        }

        if blocks == 0 {
            return Err(ScheduleError::MalformedSource(
                "no month header found".to_string(),
            ));
        }

        Ok(events)
    }
}
