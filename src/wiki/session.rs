//! Authenticated API session.
//!
//! A [`Session`] owns one HTTP client with a cookie store. The login
//! handshake leaves session cookies in that store, so the CSRF token it
//! returns is only valid together with the same `Session`.

use std::fmt;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::WikiConfig;
use super::{api_error, Result, WikiError};

/// CSRF token required by every mutating request.
///
/// Scoped to the session that obtained it. Re-authenticating invalidates it.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

/// An HTTP conversation with one Wikibase instance.
pub struct Session {
    client: Client,
    config: WikiConfig,
}

impl Session {
    /// Open a session. No request is made until the first call.
    pub fn open(config: WikiConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());

        if let Some(proxy) = config.proxy_url() {
            if !proxy.starts_with("http://") && !proxy.starts_with("https://") {
                return Err(WikiError::Config(format!("unsupported proxy scheme in {}", proxy)));
            }
            info!(proxy = %proxy, "Using proxy for Wikibase requests");
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// The API endpoint this session talks to.
    pub fn endpoint(&self) -> &str {
        &self.config.api_url
    }

    /// Log in and obtain a CSRF token.
    ///
    /// 1. fetch a login token
    /// 2. post the credentials with it
    /// 3. fetch a CSRF token with the now logged-in cookies
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<CsrfToken> {
        debug!(endpoint = %self.endpoint(), "Fetching login token");
        let login_token = self.fetch_token("login").await?;

        debug!(user = %username, "Logging in");
        let response = self
            .post(&[
                ("action", "login"),
                ("lgname", username),
                ("lgpassword", password),
                ("lgtoken", login_token.as_str()),
            ])
            .await?;

        let result = response
            .pointer("/login/result")
            .and_then(Value::as_str)
            .ok_or_else(|| match api_error(&response) {
                Some((code, info)) => WikiError::Api { code, info },
                None => WikiError::Decode("missing login.result".to_string()),
            })?;

        if result != "Success" {
            let reason = match response.pointer("/login/reason") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            warn!(user = %username, result = %result, reason = %reason, "Login rejected");
            return Err(WikiError::Auth(if reason.is_empty() {
                result.to_string()
            } else {
                format!("{}: {}", result, reason)
            }));
        }

        debug!("Fetching CSRF token");
        let csrf = self.fetch_token("csrf").await?;

        info!(user = %username, "Authenticated with Wikibase");
        Ok(CsrfToken(csrf))
    }

    async fn fetch_token(&self, kind: &str) -> Result<String> {
        let response = self
            .get(&[("action", "query"), ("meta", "tokens"), ("type", kind)])
            .await?;

        let field = format!("{}token", kind);
        response
            .get("query")
            .and_then(|q| q.get("tokens"))
            .and_then(|t| t.get(&field))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| match api_error(&response) {
                Some((code, info)) => WikiError::Api { code, info },
                None => WikiError::Decode(format!("missing query.tokens.{}", field)),
            })
    }

    /// GET with query parameters. `format=json` is added.
    pub(crate) async fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.send(false, params).await
    }

    /// Form-encoded POST. `format=json` is added.
    pub(crate) async fn post(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.send(true, params).await
    }

    async fn send(&self, write: bool, params: &[(&str, &str)]) -> Result<Value> {
        let mut params = params.to_vec();
        params.push(("format", "json"));
        let action = params
            .iter()
            .find(|(k, _)| *k == "action")
            .map(|(_, v)| *v)
            .unwrap_or_default();

        let retry = &self.config.retry;
        let mut attempt = 1;

        loop {
            let request = if write {
                self.client.post(&self.config.api_url).form(&params)
            } else {
                self.client.get(&self.config.api_url).query(&params)
            };

            match Self::execute(request).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retry.max_attempts && e.is_retryable(write) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        action = %action,
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Wikibase request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WikiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| WikiError::Decode(e.to_string()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.config.api_url)
            .field("proxy", &self.config.proxy)
            .finish()
    }
}
