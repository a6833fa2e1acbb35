use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use sheetsync_core::schedule::{
    error_code, is_retryable, schedule_error_to_status_code, DateRangeError, ScheduleError,
};

/// Seconds a client should wait before retrying a retryable failure.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    retryable: bool,
}

pub struct AppError(pub anyhow::Error);

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        if let Some(schedule_error) = self.0.downcast_ref::<ScheduleError>() {
            let status = StatusCode::from_u16(schedule_error_to_status_code(schedule_error))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, error_code(schedule_error), is_retryable(schedule_error))
        } else if self.0.downcast_ref::<DateRangeError>().is_some() {
            (StatusCode::BAD_REQUEST, "invalid_range", false)
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal", false)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = self.parts();

        if status.is_server_error() {
            tracing::warn!(status = %status, code, error = %self.0, "Request failed");
        }

        let body = Json(ErrorBody {
            error: self.0.to_string(),
            code,
            retryable,
        });

        if retryable {
            (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
