//! REST API for the summary daemon.
//!
//! Provides HTTP endpoints for:
//! - Liveness (`GET /`)
//! - Queue status (`GET /api/v1/status`)
//! - Enqueueing summary jobs (`POST /generate_article_summary`)

pub mod handlers;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// A queued request to summarize one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    pub qid: String,
}

/// Job outcome counters, shared by handlers and the worker.
#[derive(Debug, Default)]
pub struct JobCounters {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl JobCounters {
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn job_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_started(&self) {
        // Jobs sent straight into the channel were never counted
        let _ = self
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn job_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shared state for API handlers.
pub struct ApiState {
    /// Channel to the summary worker.
    pub job_tx: mpsc::Sender<SummaryJob>,

    /// Job outcome counters.
    pub counters: JobCounters,
}

impl ApiState {
    pub fn new(job_tx: mpsc::Sender<SummaryJob>) -> Self {
        Self {
            job_tx,
            counters: JobCounters::default(),
        }
    }

    /// Hand a job to the worker. Returns `false` if the worker is gone.
    pub async fn enqueue(&self, qid: String) -> bool {
        self.counters.job_queued();
        if let Err(e) = self.job_tx.send(SummaryJob { qid }).await {
            tracing::error!(qid = %e.0.qid, "Failed to queue summary job: worker stopped");
            self.counters.job_started();
            return false;
        }
        true
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status::hello))
        .route("/api/v1/status", get(handlers::status::status))
        .route(
            "/generate_article_summary",
            post(handlers::summary::generate_article_summary),
        )
        // Middleware
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                // Only log responses that are not 2xx
                .on_request(())
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    let status = response.status();
                    if !status.is_success() {
                        tracing::warn!(
                            status = %status,
                            latency_ms = latency.as_millis(),
                            "request failed"
                        );
                    }
                })
        )
        .with_state(state)
}

/// Start the API server.
pub async fn serve(state: Arc<ApiState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!("Scribe API listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
