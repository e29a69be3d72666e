use axum::{routing::get, Router};
use libcastflow::Publisher;
use secrecy::SecretString;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::routes::{cron_process_handler, health_handler, manual_process_handler};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub publisher: Publisher,
    /// Bearer token required on the cron route; `None` rejects every request
    pub cron_secret: Option<Arc<SecretString>>,
}

impl AppState {
    pub fn new(publisher: Publisher, cron_secret: Option<SecretString>) -> Self {
        Self {
            publisher,
            cron_secret: cron_secret.map(Arc::new),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // External scheduler, shared-secret guarded
        .route(
            "/api/cron/process-scheduled",
            get(cron_process_handler).post(cron_process_handler),
        )
        // Manual / administrative trigger
        .route(
            "/api/process-scheduled",
            get(manual_process_handler).post(manual_process_handler),
        )
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
