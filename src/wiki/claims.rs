//! Statement reads and value writes.
//!
//! Reads never fail on absence: a property without statements is `None`.
//! Writes report semantic rejection as `Ok(false)` and keep errors for
//! transport and decoding failures, so callers must check the boolean.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::session::{CsrfToken, Session};
use super::value::SnakValue;
use super::{api_error, is_success, Result, WikiError};

/// A statement as returned by `wbgetclaims`.
#[derive(Debug, Clone, Deserialize)]
pub struct Claim {
    /// Server-assigned statement id, stable across edits.
    pub id: String,

    /// The main value.
    #[serde(default)]
    pub mainsnak: Snak,

    /// Qualifier snaks by property id.
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub qualifiers: BTreeMap<String, Vec<Snak>>,

    /// Statement rank (`normal`, `preferred`, `deprecated`).
    #[serde(default)]
    pub rank: Option<String>,
}

/// A single snak: main value or qualifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snak {
    /// `value`, `novalue` or `somevalue`.
    #[serde(default)]
    pub snaktype: Option<String>,

    /// Property id of this snak.
    #[serde(default)]
    pub property: Option<String>,

    /// Server-assigned hash. Identifies a qualifier for targeted updates.
    #[serde(default)]
    pub hash: Option<String>,

    /// The value, absent for `novalue`/`somevalue` snaks.
    #[serde(default)]
    pub datavalue: Option<DataValue>,
}

/// Wire form of a snak value.
#[derive(Debug, Clone, Deserialize)]
pub struct DataValue {
    /// Raw value; its shape depends on the property's datatype.
    pub value: Value,

    /// Datavalue type, e.g. `monolingualtext`, `wikibase-entityid`, `string`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl Snak {
    /// Decoded value, if the snak carries one.
    pub fn value(&self) -> Option<SnakValue> {
        self.datavalue.as_ref().map(|d| SnakValue::decode(&d.value))
    }
}

impl Claim {
    /// Decoded main value.
    pub fn value(&self) -> Option<SnakValue> {
        self.mainsnak.value()
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsResponse {
    #[serde(default, deserialize_with = "map_or_empty_list")]
    claims: BTreeMap<String, Vec<Claim>>,
}

/// PHP serializes an empty map as `[]`; accept both.
fn map_or_empty_list<'de, D, T>(deserializer: D) -> std::result::Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<T> {
        Map(BTreeMap<String, T>),
        #[allow(dead_code)]
        List(Vec<serde::de::IgnoredAny>),
    }

    Ok(match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => map,
        MapOrList::List(_) => BTreeMap::new(),
    })
}

fn parse_claims(response: Value, context: &str) -> Result<BTreeMap<String, Vec<Claim>>> {
    if let Some((code, info)) = api_error(&response) {
        warn!(query = %context, code = %code, info = %info, "wbgetclaims returned an error");
        return Ok(BTreeMap::new());
    }

    let parsed: ClaimsResponse =
        serde_json::from_value(response).map_err(|e| WikiError::Decode(e.to_string()))?;
    Ok(parsed.claims)
}

/// All statements for an (item, property) pair, `None` if there are none.
pub async fn get_claims(session: &Session, item: &str, property: &str) -> Result<Option<Vec<Claim>>> {
    let response = session
        .get(&[
            ("action", "wbgetclaims"),
            ("entity", item),
            ("property", property),
        ])
        .await?;

    let mut claims = parse_claims(response, item)?;
    let claims = claims.remove(property).filter(|c| !c.is_empty());

    debug!(
        item = %item,
        property = %property,
        count = claims.as_ref().map_or(0, Vec::len),
        "Fetched claims"
    );

    Ok(claims)
}

/// Text value of the first statement for an (item, property) pair.
///
/// Monolingual text yields its text, a string yields itself, anything else
/// (entity references, quantities, `novalue` snaks) is `None`.
pub async fn get_value(session: &Session, item: &str, property: &str) -> Result<Option<String>> {
    let claims = get_claims(session, item, property).await?;

    Ok(claims
        .as_ref()
        .and_then(|c| c.first())
        .and_then(Claim::value)
        .and_then(|v| v.as_text().map(str::to_string)))
}

/// Ids of all statements for an (item, property) pair, `None` if there are none.
pub async fn get_statement_ids(
    session: &Session,
    item: &str,
    property: &str,
) -> Result<Option<Vec<String>>> {
    let claims = get_claims(session, item, property).await?;
    Ok(claims.map(|c| c.into_iter().map(|claim| claim.id).collect()))
}

/// Fetch a statement by id.
///
/// The API answers with a claims-by-property map; all entries are
/// flattened into one list. An API error body is returned as
/// [`WikiError::Api`], never read as a statement without qualifiers.
pub async fn get_statement(session: &Session, statement_id: &str) -> Result<Vec<Claim>> {
    let response = session
        .get(&[("action", "wbgetclaims"), ("claim", statement_id)])
        .await?;

    if let Some((code, info)) = api_error(&response) {
        return Err(WikiError::Api { code, info });
    }

    Ok(parse_claims(response, statement_id)?
        .into_values()
        .flatten()
        .collect())
}

fn log_write_result(action: &str, target: &str, response: &Value) -> bool {
    let ok = is_success(response);
    if ok {
        info!(action = %action, target = %target, "Wikibase write succeeded");
    } else if let Some((code, info)) = api_error(response) {
        warn!(action = %action, target = %target, code = %code, info = %info, "Wikibase write rejected");
    } else {
        warn!(action = %action, target = %target, response = %response, "Wikibase write not confirmed");
    }
    ok
}

/// Create or update a monolingual text statement.
///
/// With a statement id the existing statement's value is replaced,
/// otherwise a new statement is created on the item. Returns `true` only
/// when the API reports success.
pub async fn upsert_value(
    session: &Session,
    token: &CsrfToken,
    item: &str,
    property: &str,
    statement_id: Option<&str>,
    text: &str,
    language: &str,
) -> Result<bool> {
    if let Some(statement_id) = statement_id.filter(|id| !id.is_empty()) {
        let response = set_statement_value(session, token, statement_id, text, language).await?;
        return Ok(log_write_result("wbsetclaimvalue", statement_id, &response));
    }

    let value = SnakValue::monolingual(text, language).to_param();
    let response = session
        .post(&[
            ("action", "wbcreateclaim"),
            ("entity", item),
            ("property", property),
            ("snaktype", "value"),
            ("value", value.as_str()),
            ("token", token.as_str()),
        ])
        .await?;

    let target = format!("{}/{}", item, property);
    Ok(log_write_result("wbcreateclaim", &target, &response))
}

/// Replace the value of an existing statement with monolingual text.
///
/// Returns the raw decoded response for callers that inspect it themselves.
pub async fn set_statement_value(
    session: &Session,
    token: &CsrfToken,
    statement_id: &str,
    text: &str,
    language: &str,
) -> Result<Value> {
    let value = SnakValue::monolingual(text, language).to_param();
    session
        .post(&[
            ("action", "wbsetclaimvalue"),
            ("claim", statement_id),
            ("snaktype", "value"),
            ("value", value.as_str()),
            ("token", token.as_str()),
        ])
        .await
}
