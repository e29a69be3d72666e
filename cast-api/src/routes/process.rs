use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::auth::is_authorized;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Run one publishing batch and render the report
async fn run_batch(state: &AppState, trigger: &str) -> Response {
    match state.publisher.process_due_posts_now().await {
        Ok(report) => {
            info!(
                "{} trigger processed {} cast(s), {} error(s)",
                trigger,
                report.processed_count,
                report.errors.len()
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            error!("{} trigger failed: {}", trigger, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Entry point for the external scheduler
///
/// Requires `Authorization: Bearer <cron_secret>`.
pub async fn cron_process_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !is_authorized(&headers, state.cron_secret.as_deref()) {
        warn!("Rejected unauthorized cron trigger");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    run_batch(&state, "cron").await
}

/// Entry point for manual / administrative runs
pub async fn manual_process_handler(State(state): State<AppState>) -> Response {
    run_batch(&state, "manual").await
}
