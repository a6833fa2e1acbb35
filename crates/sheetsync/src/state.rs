//! Shared application state passed to all request handlers.

use std::sync::Arc;

use crate::service::ScheduleService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScheduleService>,
}

impl AppState {
    pub fn new(service: Arc<ScheduleService>) -> Self {
        Self { service }
    }
}
