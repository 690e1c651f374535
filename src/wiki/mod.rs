//! Wikibase statement synchronization client.
//!
//! Reads and idempotently writes statements and qualifiers through the
//! MediaWiki action API:
//! - [`session`] - HTTP session, login handshake, CSRF token
//! - [`claims`] - statement reads and value writes
//! - [`qualifier`] - read-before-write qualifier synchronization
//! - [`value`] - typed snak values and their wire encoding
//!
//! Every call takes the [`Session`] (and, for writes, the [`CsrfToken`])
//! explicitly. Independent sessions can be used side by side.

pub mod claims;
pub mod config;
pub mod ids;
pub mod qualifier;
pub mod session;
pub mod value;

#[cfg(test)]
pub(crate) mod fake;

use serde_json::Value;
use thiserror::Error;

pub use claims::{
    get_claims, get_statement, get_statement_ids, get_value, set_statement_value, upsert_value,
    Claim, Snak,
};
pub use config::{RetryPolicy, WikiConfig};
pub use ids::{
    is_item_id, is_property_id, resolve_external_id, PID_ARXIV_ID, PID_GENERATED_BY, PID_SUMMARY,
    PID_SUMMARY_SIMPLE,
};
pub use qualifier::{ensure_qualifier, try_ensure_qualifier, QualifierSync};
pub use session::{CsrfToken, Session};
pub use value::SnakValue;

/// Errors from the Wikibase client.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    Decode(String),

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("Qualifier write rejected: {0}")]
    Sync(String),

    #[error("Missing {0}")]
    Precondition(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WikiError {
    /// Whether this failure is worth another attempt.
    ///
    /// Reads retry on connect errors, timeouts and 5xx answers. Writes only
    /// retry when the request never reached the server.
    pub fn is_retryable(&self, write: bool) -> bool {
        match self {
            Self::Transport(e) if write => e.is_connect(),
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::Status { status, .. } => !write && *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WikiError>;

/// Whether a write response reports success.
///
/// The API answers `"success": 1`; a boolean `true` is accepted as well.
pub fn is_success(response: &Value) -> bool {
    match response.get("success") {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Extract `(code, info)` from an API error body, if present.
pub fn api_error(response: &Value) -> Option<(String, String)> {
    let error = response.get("error")?;
    let field = |name: &str| {
        error
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some((field("code"), field("info")))
}
