//! Scribe - article summaries for a Wikibase knowledge graph.
//!
//! Scribe takes a publication item, finds its arXiv id, summarizes the
//! rendered article with a language model and writes the summaries back
//! to the item as statements tagged with the model that produced them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  API (axum)          POST /generate_article_summary           │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ mpsc job channel
//! ┌───────────────────────────────┴──────────────────────────────┐
//! │  Worker → Pipeline                                            │
//! │    resolve arXiv id → fetch text → summarize → sync claims    │
//! └──────┬───────────────────────┬──────────────────────┬────────┘
//!        │                       │                      │
//!   ar5iv (HTML)          generate API (NDJSON)   Wikibase action API
//! ```
//!
//! # Key Properties
//!
//! - **Idempotent writes**: re-running a job updates statements in place
//!   and never duplicates a qualifier
//! - **Explicit sessions**: every Wikibase call takes its session and token
//! - **Typed outcomes**: semantic rejections are values, not log lines

pub mod api;
pub mod config;
pub mod document;
pub mod llm;
pub mod pipeline;
pub mod wiki;
pub mod worker;

pub use config::{ConfigError, Secrets};
pub use pipeline::{Credentials, PipelineError, SummaryPipeline, SummaryReport};
pub use wiki::{QualifierSync, Session, SnakValue, WikiConfig, WikiError};
