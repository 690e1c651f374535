//! Identifier shapes and the fixed property table.

use super::claims::get_value;
use super::session::Session;
use super::Result;

/// Property holding the arXiv identifier of a publication item.
pub const PID_ARXIV_ID: &str = "P21";

/// Property holding the generated summary.
pub const PID_SUMMARY: &str = "P1638";

/// Property holding the simplified summary.
pub const PID_SUMMARY_SIMPLE: &str = "P1639";

/// Qualifier property recording what generated a statement.
pub const PID_GENERATED_BY: &str = "P1642";

fn has_numeric_suffix(id: &str, prefix: char) -> bool {
    match id.strip_prefix(prefix) {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Check whether a string is shaped like an item id (`Q` followed by digits).
pub fn is_item_id(id: &str) -> bool {
    has_numeric_suffix(id, 'Q')
}

/// Check whether a string is shaped like a property id (`P` followed by digits).
pub fn is_property_id(id: &str) -> bool {
    has_numeric_suffix(id, 'P')
}

/// Resolve the external document identifier (arXiv id) linked to an item.
///
/// Returns `None` when the item has no such statement.
pub async fn resolve_external_id(session: &Session, item: &str) -> Result<Option<String>> {
    get_value(session, item, PID_ARXIV_ID).await
}
