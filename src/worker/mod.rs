//! Event-driven summary worker.
//!
//! The worker waits on a channel for jobs queued by the API - no polling.
//! Jobs run one at a time, in the order they were queued.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::{ApiState, SummaryJob};
use crate::document::DocumentSource;
use crate::llm::TextGenerator;
use crate::pipeline::{PipelineError, SummaryPipeline};

/// Job channel capacity.
pub const JOB_QUEUE_CAPACITY: usize = 100;

/// Create the job channel between API and worker.
pub fn create_job_channel() -> (mpsc::Sender<SummaryJob>, mpsc::Receiver<SummaryJob>) {
    mpsc::channel(JOB_QUEUE_CAPACITY)
}

/// Runs queued summary jobs.
pub struct JobWorker<D, G> {
    state: Arc<ApiState>,
    pipeline: SummaryPipeline<D, G>,
}

impl<D, G> JobWorker<D, G>
where
    D: DocumentSource,
    G: TextGenerator,
{
    pub fn new(state: Arc<ApiState>, pipeline: SummaryPipeline<D, G>) -> Self {
        Self { state, pipeline }
    }

    /// Process jobs until every sender is dropped.
    pub async fn run(self, mut job_rx: mpsc::Receiver<SummaryJob>) {
        info!("Summary worker started");

        while let Some(job) = job_rx.recv().await {
            self.state.counters.job_started();
            debug!(qid = %job.qid, "Received summary job");

            match self.execute(&job).await {
                Ok(()) => self.state.counters.job_completed(),
                Err(e) => {
                    error!(qid = %job.qid, error = %e, "Summary job failed");
                    self.state.counters.job_failed();
                }
            }
        }

        info!("Summary worker shutting down (channel closed)");
    }

    async fn execute(&self, job: &SummaryJob) -> Result<(), PipelineError> {
        info!(qid = %job.qid, "Executing summary job");
        let report = self.pipeline.run(&job.qid).await?;

        for write in &report.writes {
            info!(
                qid = %report.qid,
                property = %write.property,
                statement_id = %write.statement_id,
                provenance = ?write.qualifier,
                "Summary statement synced"
            );
        }
        Ok(())
    }
}

/// Start the worker in a background task.
pub fn spawn_worker<D, G>(
    state: Arc<ApiState>,
    pipeline: SummaryPipeline<D, G>,
    job_rx: mpsc::Receiver<SummaryJob>,
) -> tokio::task::JoinHandle<()>
where
    D: DocumentSource + 'static,
    G: TextGenerator + 'static,
{
    let worker = JobWorker::new(state, pipeline);
    tokio::spawn(async move {
        worker.run(job_rx).await;
    })
}
