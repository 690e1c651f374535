//! Article summary pipeline.
//!
//! Resolves an item's arXiv id, summarizes the rendered article and writes
//! both summaries back as statements, each tagged with the generator item.
//! Every step is idempotent, so a job can be re-run after any failure.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::document::{DocumentError, DocumentSource};
use crate::llm::{summarize_article, LlmError, TextGenerator};
use crate::wiki::{
    ensure_qualifier, get_statement_ids, is_item_id, resolve_external_id, upsert_value, CsrfToken,
    QualifierSync, Session, WikiConfig, WikiError, PID_GENERATED_BY, PID_SUMMARY,
    PID_SUMMARY_SIMPLE,
};

/// Language of the written summaries.
pub const SUMMARY_LANGUAGE: &str = "en";

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Wikibase error: {0}")]
    Wiki(#[from] WikiError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Text generation error: {0}")]
    Llm(#[from] LlmError),

    #[error("Write of {property} rejected")]
    WriteRejected { property: &'static str },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Bot account used for writes.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One summary statement written by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyWrite {
    pub property: &'static str,
    pub statement_id: String,
    /// Outcome of the provenance qualifier, `None` when no generator item is configured.
    pub qualifier: Option<QualifierSync>,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub qid: String,
    pub external_id: String,
    pub writes: Vec<PropertyWrite>,
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (arXiv {})", self.qid, self.external_id)?;
        for write in &self.writes {
            let qualifier = match &write.qualifier {
                None => "no provenance",
                Some(QualifierSync::AlreadySatisfied) => "provenance unchanged",
                Some(QualifierSync::Updated { .. }) => "provenance updated",
                Some(QualifierSync::Created) => "provenance added",
            };
            writeln!(f, "  {} {} ({})", write.property, write.statement_id, qualifier)?;
        }
        Ok(())
    }
}

/// Summarizes articles and syncs the result into Wikibase.
pub struct SummaryPipeline<D, G> {
    wiki: WikiConfig,
    credentials: Credentials,
    generated_by: Option<String>,
    documents: D,
    generator: G,
}

impl<D, G> SummaryPipeline<D, G>
where
    D: DocumentSource,
    G: TextGenerator,
{
    pub fn new(wiki: WikiConfig, credentials: Credentials, documents: D, generator: G) -> Self {
        Self {
            wiki,
            credentials,
            generated_by: None,
            documents,
            generator,
        }
    }

    /// Item recorded as `generated by` on every summary statement.
    pub fn with_generated_by(mut self, item: Option<String>) -> Self {
        self.generated_by = item.filter(|i| !i.is_empty());
        self
    }

    /// arXiv id of an item, without logging in.
    pub async fn resolve(&self, qid: &str) -> Result<Option<String>> {
        if !is_item_id(qid) {
            return Err(PipelineError::InvalidIdentifier(qid.to_string()));
        }
        let session = Session::open(self.wiki.clone())?;
        Ok(resolve_external_id(&session, qid).await?)
    }

    /// Summarize the article behind `qid` and write both summaries.
    pub async fn run(&self, qid: &str) -> Result<SummaryReport> {
        if !is_item_id(qid) {
            return Err(PipelineError::InvalidIdentifier(qid.to_string()));
        }

        let session = Session::open(self.wiki.clone())?;
        let external_id = resolve_external_id(&session, qid)
            .await?
            .ok_or_else(|| PipelineError::InvalidIdentifier(qid.to_string()))?;
        info!(qid = %qid, arxiv_id = %external_id, "Resolved article");

        let text = self.documents.fetch_text(&external_id).await?;
        let summary = summarize_article(&self.generator, &text).await?;

        let token = session
            .authenticate(&self.credentials.username, &self.credentials.password)
            .await?;

        if self.generated_by.is_none() {
            warn!(qid = %qid, "No generator item configured, skipping provenance qualifiers");
        }

        let mut writes = Vec::with_capacity(2);
        for (property, text) in [
            (PID_SUMMARY, summary.full.as_str()),
            (PID_SUMMARY_SIMPLE, summary.simplified.as_str()),
        ] {
            writes.push(self.write_summary(&session, &token, qid, property, text).await?);
        }

        info!(qid = %qid, arxiv_id = %external_id, "Summaries written");
        Ok(SummaryReport {
            qid: qid.to_string(),
            external_id,
            writes,
        })
    }

    async fn write_summary(
        &self,
        session: &Session,
        token: &CsrfToken,
        qid: &str,
        property: &'static str,
        text: &str,
    ) -> Result<PropertyWrite> {
        let existing = first_statement_id(session, qid, property).await?;
        let written = upsert_value(
            session,
            token,
            qid,
            property,
            existing.as_deref(),
            text,
            SUMMARY_LANGUAGE,
        )
        .await?;
        if !written {
            return Err(PipelineError::WriteRejected { property });
        }

        let statement_id = first_statement_id(session, qid, property)
            .await?
            .ok_or_else(|| WikiError::Decode(format!("no {} statement on {} after write", property, qid)))?;

        let qualifier = match &self.generated_by {
            Some(item) => Some(
                ensure_qualifier(session, token, &statement_id, PID_GENERATED_BY, item, None).await?,
            ),
            None => None,
        };

        Ok(PropertyWrite {
            property,
            statement_id,
            qualifier,
        })
    }
}

async fn first_statement_id(session: &Session, item: &str, property: &str) -> Result<Option<String>> {
    let ids = get_statement_ids(session, item, property).await?;
    Ok(ids.and_then(|ids| ids.into_iter().next()))
}
