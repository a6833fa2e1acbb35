pub mod error;
pub mod health;
pub mod schedule;

pub use error::AppError;
