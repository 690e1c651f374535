//! Summary job submission.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::ApiState;
use crate::wiki::is_item_id;

/// Request body for `POST /generate_article_summary`.
#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    /// Item to summarize, e.g. `Q6767`.
    pub qid: String,
}

/// Queue a summary job. The work happens in the background.
pub async fn generate_article_summary(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SummaryRequest>,
) -> StatusCode {
    let qid = request.qid.trim().to_string();
    if !is_item_id(&qid) {
        warn!(qid = %request.qid, "Rejected summary request: not an item id");
        return StatusCode::BAD_REQUEST;
    }

    if !state.enqueue(qid.clone()).await {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    info!(qid = %qid, "Summary job queued");
    StatusCode::NO_CONTENT
}
