//! Text generation client.
//!
//! Talks to an Ollama-style `/api/generate` endpoint, which streams its answer
//! as newline-delimited JSON objects. The article summary is produced in two
//! passes: a detailed summary of the article, then a short rewrite of it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Default generate endpoint.
pub const DEFAULT_GENERATE_URL: &str = "https://ollama.zib.de/ollama/api/generate";

/// Default model.
pub const DEFAULT_MODEL: &str = "nemotron:latest";

/// Characters of input passed to each prompt.
pub const MAX_PROMPT_INPUT_CHARS: usize = 10_000;

const FIRST_PASS_PROMPT: &str = " Write a summary about the following scientific article suitable for a mathematician. \
 The summary should describe the overall idea in a connected and coherent text. \
 Do not use bullet points, or enumeration or technical jargon that is not explained, \
 or references to the structure (e.g., sections, figures, or tables) of the article. \
 The summary should provide a readable and concise overview. \
 Ignore anything that seems not complete. \
 Start the summary with: \"This paper is about ... \". \n \n \n \
 This is the scientific article: \n \n \n";

const SECOND_PASS_PROMPT: &str = " Take the following text and make a new concise text starting with \"This article ... \" \
 with about 5 sentences out of it. Make sure to leave any Latex commands unchanged. \
 Do not repeat the task in the beginning. This is the text: \n \n \n";

/// Text generation errors.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Generation request timed out")]
    Timeout,

    #[error("Generation request failed: {0}")]
    Transport(reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed generation stream: {0}")]
    Decode(String),

    #[error("Model reported an error: {0}")]
    Model(String),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// The two summaries produced for an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// First pass: detailed summary of the article.
    pub full: String,
    /// Second pass: short rewrite of the first pass.
    pub simplified: String,
}

/// Replace newlines and tabs with spaces and trim.
pub fn clean_text(input: &str) -> String {
    input.replace(['\n', '\t'], " ").trim().to_string()
}

/// The first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Summarize an article in two passes.
pub async fn summarize_article<G>(generator: &G, article: &str) -> Result<Summary, LlmError>
where
    G: TextGenerator + ?Sized,
{
    let prompt = format!("{}{}", FIRST_PASS_PROMPT, truncate_chars(article, MAX_PROMPT_INPUT_CHARS));
    let full = clean_text(&generator.generate(&prompt).await?);
    if full.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    debug!(chars = full.len(), "First summary pass complete");

    let prompt = format!("{}{}", SECOND_PASS_PROMPT, truncate_chars(&full, MAX_PROMPT_INPUT_CHARS));
    let simplified = clean_text(&generator.generate(&prompt).await?);
    if simplified.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    debug!(chars = simplified.len(), "Second summary pass complete");

    Ok(Summary { full, simplified })
}

/// Configuration for [`OllamaClient`].
#[derive(Clone)]
pub struct OllamaConfig {
    /// Generate endpoint URL.
    pub url: String,
    /// Model name.
    pub model: String,
    /// Bearer token for the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Timeout for one whole generation.
    pub timeout: Duration,
}

impl OllamaConfig {
    /// Default endpoint and model with the given token.
    pub fn new(bearer_token: Option<String>) -> Self {
        Self {
            url: DEFAULT_GENERATE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            bearer_token,
            timeout: Duration::from_secs(600),
        }
    }

    /// Use a different endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl fmt::Debug for OllamaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Collects the `response` fields of an NDJSON stream.
///
/// Chunks may end in the middle of a line.
#[derive(Debug, Default)]
pub struct NdjsonAccumulator {
    pending: Vec<u8>,
    text: String,
}

impl NdjsonAccumulator {
    /// Feed the next chunk of the body.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), LlmError> {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line)?;
        }
        Ok(())
    }

    /// Flush any unterminated last line and return the trimmed text.
    pub fn finish(mut self) -> Result<String, LlmError> {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest)?;
        Ok(self.text.trim().to_string())
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), LlmError> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let chunk: GenerateChunk =
            serde_json::from_str(line).map_err(|e| LlmError::Decode(e.to_string()))?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Model(error));
        }
        self.text.push_str(&chunk.response);
        Ok(())
    }
}

/// Ollama generate API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Create a client.
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        info!(model = %self.config.model, prompt_chars = prompt.len(), "Requesting generation");

        let mut request = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
            });
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut accumulator = NdjsonAccumulator::default();
        while let Some(chunk) = stream.next().await {
            accumulator.push(&chunk?)?;
        }

        let text = accumulator.finish()?;
        debug!(chars = text.len(), "Generation complete");
        Ok(text)
    }
}
