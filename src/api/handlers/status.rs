//! Liveness and status handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::ApiState;

/// Status response.
#[derive(Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: String,

    /// Jobs waiting for the worker.
    pub queued: u64,

    /// Jobs that wrote both summaries.
    pub completed: u64,

    /// Jobs that ended in an error.
    pub failed: u64,
}

/// Plain liveness probe.
pub async fn hello() -> &'static str {
    "Hello World!"
}

/// Queue status endpoint.
pub async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let counters = &state.counters;

    Json(StatusResponse {
        status: "ok".to_string(),
        queued: counters.queued(),
        completed: counters.completed(),
        failed: counters.failed(),
    })
}
