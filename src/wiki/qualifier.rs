//! Qualifier synchronization.
//!
//! Ensures a statement carries a qualifier with a given value without ever
//! duplicating it. The qualifier hash needed for a targeted replacement is
//! assigned by the server, so every sync starts by reading the statement.
//!
//! Only the first divergent qualifier under the property is replaced; any
//! further values under the same property are left untouched.

use serde_json::Value;
use tracing::{debug, error, info};

use super::claims::get_statement;
use super::session::{CsrfToken, Session};
use super::value::SnakValue;
use super::{is_success, Result, WikiError};

/// Outcome of a successful qualifier sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualifierSync {
    /// A qualifier with the desired value already exists. Nothing was written.
    AlreadySatisfied,

    /// An existing qualifier was replaced.
    Updated {
        /// Hash of the qualifier that was replaced.
        previous_hash: String,
    },

    /// A new qualifier was added.
    Created,
}

impl QualifierSync {
    /// Whether a write request was issued.
    pub fn wrote(&self) -> bool {
        !matches!(self, Self::AlreadySatisfied)
    }
}

/// Make sure `statement_id` has a `property` qualifier with `value`.
///
/// The value is written as an entity reference when it looks like an item id,
/// as monolingual text when a language is given, and as a plain string
/// otherwise. The same rule decides whether an existing qualifier matches.
pub async fn ensure_qualifier(
    session: &Session,
    token: &CsrfToken,
    statement_id: &str,
    property: &str,
    value: &str,
    language: Option<&str>,
) -> Result<QualifierSync> {
    if statement_id.is_empty() {
        return Err(WikiError::Precondition("statement id"));
    }

    let desired = SnakValue::for_write(value, language);
    let claims = get_statement(session, statement_id).await?;

    let existing: Vec<_> = claims
        .iter()
        .filter_map(|claim| claim.qualifiers.get(property))
        .flatten()
        .collect();

    debug!(
        statement_id = %statement_id,
        property = %property,
        kind = desired.kind(),
        existing = existing.len(),
        "Syncing qualifier"
    );

    if existing.iter().any(|snak| snak.value().as_ref() == Some(&desired)) {
        debug!(statement_id = %statement_id, property = %property, "Qualifier already present");
        return Ok(QualifierSync::AlreadySatisfied);
    }

    if let Some(snak) = existing.first() {
        let hash = snak
            .hash
            .as_deref()
            .ok_or_else(|| WikiError::Decode(format!("qualifier {} without hash", property)))?;

        let response = set_qualifier(session, token, statement_id, property, &desired, Some(hash)).await?;
        if !is_success(&response) {
            return Err(WikiError::Sync(format!("failed to update qualifier: {}", response)));
        }

        info!(statement_id = %statement_id, property = %property, hash = %hash, "Qualifier updated");
        return Ok(QualifierSync::Updated {
            previous_hash: hash.to_string(),
        });
    }

    let response = set_qualifier(session, token, statement_id, property, &desired, None).await?;
    if !is_success(&response) {
        return Err(WikiError::Sync(format!("failed to add qualifier: {}", response)));
    }

    info!(statement_id = %statement_id, property = %property, "Qualifier added");
    Ok(QualifierSync::Created)
}

/// Best-effort [`ensure_qualifier`]: logs any failure and reports it as `false`.
pub async fn try_ensure_qualifier(
    session: &Session,
    token: &CsrfToken,
    statement_id: &str,
    property: &str,
    value: &str,
    language: Option<&str>,
) -> bool {
    match ensure_qualifier(session, token, statement_id, property, value, language).await {
        Ok(_) => true,
        Err(WikiError::Precondition(what)) => {
            debug!(property = %property, "Missing {}, cannot sync qualifier", what);
            false
        }
        Err(e) => {
            error!(statement_id = %statement_id, property = %property, error = %e, "Qualifier sync failed");
            false
        }
    }
}

async fn set_qualifier(
    session: &Session,
    token: &CsrfToken,
    statement_id: &str,
    property: &str,
    value: &SnakValue,
    snak_hash: Option<&str>,
) -> Result<Value> {
    let value = value.to_param();
    let mut params = vec![
        ("action", "wbsetqualifier"),
        ("claim", statement_id),
        ("property", property),
    ];
    if let Some(hash) = snak_hash {
        params.push(("snakhash", hash));
    }
    params.extend([
        ("snaktype", "value"),
        ("value", value.as_str()),
        ("token", token.as_str()),
    ]);

    session.post(&params).await
}
