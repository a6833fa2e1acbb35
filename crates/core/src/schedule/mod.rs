mod error;
mod http_mapping;
mod operations;
mod parser;
mod traits;
mod types;

pub use error::{DateRangeError, Result, ScheduleError};
pub use http_mapping::{error_code, is_retryable, schedule_error_to_status_code};
pub use operations::{filter_events, upcoming_events};
pub use parser::{month_name, month_number, MonthBlockParser};
pub use traits::{EventParser, GridFetcher};
pub use types::{DateRange, EventRecord, RawGrid, ScheduleSnapshot};
