//! Rendered article text.
//!
//! Fetches the HTML rendering of an arXiv article from ar5iv and reduces it to
//! plain text. MathML is replaced by its TeX annotation so formulas survive
//! as `$...$`.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::{debug, info};

/// Default ar5iv HTML base URL.
pub const DEFAULT_AR5IV_URL: &str = "https://ar5iv.labs.arxiv.org/html/";

const TEX_ANNOTATION: &str = r#"annotation[encoding="application/x-tex"]"#;

/// Document fetch errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("No text found for {0}")]
    Empty(String),
}

/// Source of plain article text by external identifier.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the cleaned text of the document.
    async fn fetch_text(&self, external_id: &str) -> Result<String, DocumentError>;
}

/// ar5iv HTML renderer.
#[derive(Debug, Clone)]
pub struct Ar5ivSource {
    client: Client,
    base_url: String,
}

impl Ar5ivSource {
    /// Create a source against `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, arxiv_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), arxiv_id.trim())
    }
}

impl Default for Ar5ivSource {
    fn default() -> Self {
        Self::new(Client::new(), DEFAULT_AR5IV_URL)
    }
}

#[async_trait]
impl DocumentSource for Ar5ivSource {
    async fn fetch_text(&self, external_id: &str) -> Result<String, DocumentError> {
        let url = self.url_for(external_id);
        info!(url = %url, "Fetching rendered article");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocumentError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let html = response.text().await?;
        let text = extract_text(&html);
        debug!(external_id = %external_id, chars = text.len(), "Extracted article text");

        if text.is_empty() {
            return Err(DocumentError::Empty(external_id.to_string()));
        }
        Ok(text)
    }
}

/// Reduce an HTML document to space-separated text.
///
/// Script and style contents are dropped. Each `math` element becomes
/// `$<tex>$` from its TeX annotation, or disappears if it has none.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let tex = Selector::parse(TEX_ANNOTATION).ok();

    let mut parts = Vec::new();
    walk(document.root_element(), tex.as_ref(), &mut parts);
    parts.join(" ")
}

fn walk(element: ElementRef<'_>, tex: Option<&Selector>, parts: &mut Vec<String>) {
    match element.value().name() {
        "script" | "style" => return,
        "math" => {
            let annotation = tex.and_then(|selector| element.select(selector).next());
            if let Some(annotation) = annotation {
                let latex = annotation.text().collect::<String>();
                let latex = format!("${}$", latex);
                parts.push(latex.trim().to_string());
            }
            return;
        }
        _ => {}
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, tex, parts);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_text() {
        let html = r#"<html><head><title>On Graphs</title><style>p { color: red }</style></head>
            <body><h1>On   Graphs</h1>
            <p>We study <em>sparse</em> graphs.</p>
            <script>var x = 1;</script></body></html>"#;

        assert_eq!(extract_text(html), "On Graphs On   Graphs We study sparse graphs.");
    }

    #[test]
    fn test_math_becomes_tex() {
        let html = r#"<html><body><p>Let
            <math><semantics><mi>x</mi>
            <annotation encoding="application/x-tex">x^2 + 1</annotation></semantics></math>
            be positive.</p>
            <p>Drop <math><mi>y</mi></math> this.</p></body></html>"#;

        assert_eq!(extract_text(html), "Let $x^2 + 1$ be positive. Drop this.");
    }

    #[test]
    fn test_url_for() {
        let source = Ar5ivSource::new(Client::new(), "https://ar5iv.labs.arxiv.org/html/");
        assert_eq!(
            source.url_for("2301.00001"),
            "https://ar5iv.labs.arxiv.org/html/2301.00001"
        );
        assert_eq!(
            source.url_for("math/0601001"),
            "https://ar5iv.labs.arxiv.org/html/math/0601001"
        );
    }
}
