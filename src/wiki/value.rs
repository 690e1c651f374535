//! Typed snak values.
//!
//! Wikibase serializes item references, language-tagged text and plain
//! scalars differently. Values read from the API are decoded into
//! [`SnakValue`] by shape, and values written back are encoded from it, so
//! comparison and writing always agree on one representation.

use serde_json::{json, Value};

use super::ids::is_item_id;

/// A decoded snak value.
#[derive(Debug, Clone, PartialEq)]
pub enum SnakValue {
    /// Reference to another item (`{"entity-type": "item", "id": "Q42"}`).
    EntityRef(String),

    /// Language-tagged text (`{"text": ..., "language": ...}`).
    MonolingualText {
        /// The text.
        text: String,
        /// Language code, e.g. `en`.
        language: String,
    },

    /// Any other value, compared as-is.
    Scalar(Value),
}

impl SnakValue {
    /// Classify a value we intend to write.
    ///
    /// Item-shaped strings are always entity references, even when a language
    /// is given. Otherwise a language makes it monolingual text, and anything
    /// else is a plain string scalar.
    pub fn for_write(value: &str, language: Option<&str>) -> Self {
        if is_item_id(value) {
            Self::EntityRef(value.to_string())
        } else if let Some(language) = language {
            Self::MonolingualText {
                text: value.to_string(),
                language: language.to_string(),
            }
        } else {
            Self::Scalar(Value::String(value.to_string()))
        }
    }

    /// Monolingual text value.
    pub fn monolingual(text: &str, language: &str) -> Self {
        Self::MonolingualText {
            text: text.to_string(),
            language: language.to_string(),
        }
    }

    /// Decode a `datavalue.value` from the wire.
    ///
    /// Objects with a `text` field are monolingual text, objects with an `id`
    /// field are entity references, everything else is a scalar.
    pub fn decode(value: &Value) -> Self {
        if let Some(obj) = value.as_object() {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                let language = obj
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                return Self::MonolingualText {
                    text: text.to_string(),
                    language: language.to_string(),
                };
            }
            if let Some(id) = obj.get("id").and_then(Value::as_str) {
                return Self::EntityRef(id.to_string());
            }
        }
        Self::Scalar(value.clone())
    }

    /// Encode for the `value` parameter of write requests.
    pub fn encode(&self) -> Value {
        match self {
            Self::EntityRef(id) => json!({ "entity-type": "item", "id": id }),
            Self::MonolingualText { text, language } => {
                json!({ "text": text, "language": language })
            }
            Self::Scalar(value) => value.clone(),
        }
    }

    /// Encoded value as the JSON string the API expects.
    pub fn to_param(&self) -> String {
        self.encode().to_string()
    }

    /// Human-readable text: the text of monolingual values, or a string scalar.
    ///
    /// Entity references and non-string scalars have no text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::MonolingualText { text, .. } => Some(text),
            Self::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Short label of the encoding, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityRef(_) => "entity",
            Self::MonolingualText { .. } => "monolingualtext",
            Self::Scalar(_) => "scalar",
        }
    }
}
