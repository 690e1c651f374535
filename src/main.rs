//! Scribe - article summaries for a Wikibase knowledge graph.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe::{
    api::{self, ApiState},
    config::{secrets_path, Secrets},
    document::Ar5ivSource,
    llm::OllamaClient,
    worker::{self, create_job_channel},
    Credentials, PipelineError, SummaryPipeline,
};

/// Article summaries for a Wikibase knowledge graph.
#[derive(Parser)]
#[command(name = "scribe", about = "Article summaries for a Wikibase knowledge graph")]
struct Cli {
    /// Secrets file with Wikibase and model credentials.
    #[arg(long, global = true, env = "SCRIBE_SECRETS")]
    secrets: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API daemon and summary worker.
    Daemon {
        /// Address to bind the API server.
        #[arg(long, default_value = "0.0.0.0:5000", env = "SCRIBE_BIND")]
        bind: String,
    },

    /// Print the arXiv id of an item.
    Resolve {
        /// Item id, e.g. Q6767.
        qid: String,
    },

    /// Summarize one item now and print what was written.
    Summarize {
        /// Item id, e.g. Q6767.
        qid: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let path = secrets_path(cli.secrets.as_deref());
    let secrets = Secrets::load(&path)?;
    let pipeline = build_pipeline(&secrets)?;

    match cli.command {
        Commands::Daemon { bind } => {
            run_daemon(&bind, pipeline).await?;
        }

        Commands::Resolve { qid } => match pipeline.resolve(&qid).await {
            Ok(Some(arxiv_id)) => println!("{}", arxiv_id),
            Ok(None) | Err(PipelineError::InvalidIdentifier(_)) => println!("invalid identifier"),
            Err(e) => return Err(e.into()),
        },

        Commands::Summarize { qid } => {
            let report = pipeline.run(&qid).await?;
            print!("{}", report);
        }
    }

    Ok(())
}

fn build_pipeline(secrets: &Secrets) -> Result<SummaryPipeline<Ar5ivSource, OllamaClient>> {
    let generator = OllamaClient::new(secrets.llm_config()).context("Failed to build model client")?;

    Ok(SummaryPipeline::new(
        secrets.wiki_config(),
        Credentials::new(&secrets.wiki_username, &secrets.wiki_password),
        Ar5ivSource::default(),
        generator,
    )
    .with_generated_by(secrets.generated_by.clone()))
}

/// Run the API daemon.
async fn run_daemon(bind: &str, pipeline: SummaryPipeline<Ar5ivSource, OllamaClient>) -> Result<()> {
    tracing::info!("Starting Scribe daemon...");

    let (job_tx, job_rx) = create_job_channel();
    let state = Arc::new(ApiState::new(job_tx));

    let _worker_handle = worker::spawn_worker(state.clone(), pipeline, job_rx);

    api::serve(state, bind).await?;

    Ok(())
}
