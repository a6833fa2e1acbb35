//! Grid sources for the schedule cache.
//!
//! - [`SheetsFetcher`]: the Google Sheets values API
//! - [`StaticGridFetcher`]: a fixed grid, used for the demo mode

mod inmemory;
mod sheets;

pub use inmemory::{demo_grid, StaticGridFetcher};
pub use sheets::SheetsFetcher;
