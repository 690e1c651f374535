//! Secrets and service configuration.
//!
//! Credentials live in a JSON file outside the repository, e.g.:
//!
//! ```json
//! {
//!   "wiki_api_url": "https://portal.mardi4nfdi.de/w/api.php",
//!   "wiki_username": "SummaryBot",
//!   "wiki_password": "...",
//!   "llm_bearer_token": "...",
//!   "proxy": "47.254.131.67:3128",
//!   "generated_by": "Q6534265"
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::llm::OllamaConfig;
use crate::wiki::{is_item_id, WikiConfig};

/// Default secrets file name.
pub const SECRETS_FILE: &str = "secrets.json";

/// Config errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Secrets file {0} not found")]
    NotFound(PathBuf),

    #[error("Cannot read secrets file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid secrets file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Credentials and endpoints loaded from the secrets file.
#[derive(Clone, Deserialize)]
pub struct Secrets {
    /// Wikibase action API URL.
    pub wiki_api_url: String,

    /// Bot account name.
    pub wiki_username: String,

    /// Bot account password.
    pub wiki_password: String,

    /// Bearer token for the text generation service.
    #[serde(default)]
    pub llm_bearer_token: Option<String>,

    /// Optional proxy for Wikibase requests.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Item recorded as the generator of written summaries.
    #[serde(default)]
    pub generated_by: Option<String>,

    /// Override of the text generation endpoint.
    #[serde(default)]
    pub llm_url: Option<String>,

    /// Override of the text generation model.
    #[serde(default)]
    pub llm_model: Option<String>,
}

impl Secrets {
    /// Load and validate a secrets file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let secrets: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        secrets.validate()?;
        Ok(secrets)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wiki_api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "wiki_api_url",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(item) = &self.generated_by {
            if !is_item_id(item) {
                return Err(ConfigError::Invalid {
                    field: "generated_by",
                    reason: format!("{} is not an item id", item),
                });
            }
        }
        Ok(())
    }

    /// Wikibase session config.
    pub fn wiki_config(&self) -> WikiConfig {
        WikiConfig::new(self.wiki_api_url.clone()).with_proxy(self.proxy.clone())
    }

    /// Text generation config.
    pub fn llm_config(&self) -> OllamaConfig {
        let mut config = OllamaConfig::new(self.llm_bearer_token.clone());
        if let Some(url) = &self.llm_url {
            config = config.with_url(url.clone());
        }
        if let Some(model) = &self.llm_model {
            config = config.with_model(model.clone());
        }
        config
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("wiki_api_url", &self.wiki_api_url)
            .field("wiki_username", &self.wiki_username)
            .field("wiki_password", &"<redacted>")
            .field("llm_bearer_token", &self.llm_bearer_token.as_ref().map(|_| "<redacted>"))
            .field("proxy", &self.proxy)
            .field("generated_by", &self.generated_by)
            .finish()
    }
}

/// Locate the secrets file.
///
/// An explicit path wins. Otherwise `secrets.json` in the working directory,
/// then in the platform config directory.
pub fn secrets_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = PathBuf::from(SECRETS_FILE);
    if local.exists() {
        return local;
    }

    directories::ProjectDirs::from("de", "mardi", "scribe")
        .map(|dirs| dirs.config_dir().join(SECRETS_FILE))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(SECRETS_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_secrets() {
        let temp = TempDir::new().unwrap();
        let path = write(
            &temp,
            r#"{
                "wiki_api_url": "https://wiki.example/w/api.php",
                "wiki_username": "bot",
                "wiki_password": "pw",
                "llm_bearer_token": "tok",
                "proxy": "10.0.0.1:3128",
                "generated_by": "Q77"
            }"#,
        );

        let secrets = Secrets::load(&path).unwrap();
        assert_eq!(secrets.wiki_username, "bot");
        assert_eq!(secrets.generated_by.as_deref(), Some("Q77"));

        let wiki = secrets.wiki_config();
        assert_eq!(wiki.api_url, "https://wiki.example/w/api.php");
        assert_eq!(wiki.proxy_url().as_deref(), Some("http://10.0.0.1:3128"));

        let llm = secrets.llm_config();
        assert_eq!(llm.bearer_token.as_deref(), Some("tok"));
        assert_eq!(llm.model, crate::llm::DEFAULT_MODEL);
    }

    #[test]
    fn test_missing_file() {
        let result = Secrets::load(Path::new("/nonexistent/secrets.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, r#"{ "wiki_api_url": "x" "#);
        assert!(matches!(Secrets::load(&path), Err(ConfigError::Parse { .. })));

        // Required field missing
        let path = write(&temp, r#"{ "wiki_api_url": "x", "wiki_username": "bot" }"#);
        assert!(matches!(Secrets::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_generator_item() {
        let temp = TempDir::new().unwrap();
        let path = write(
            &temp,
            r#"{ "wiki_api_url": "x", "wiki_username": "bot", "wiki_password": "pw", "generated_by": "nemotron" }"#,
        );
        assert!(matches!(
            Secrets::load(&path),
            Err(ConfigError::Invalid { field: "generated_by", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let secrets: Secrets = serde_json::from_str(
            r#"{ "wiki_api_url": "x", "wiki_username": "bot", "wiki_password": "hunter2", "llm_bearer_token": "tok123" }"#,
        )
        .unwrap();
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok123"));
    }

    #[test]
    fn test_explicit_secrets_path_wins() {
        let path = secrets_path(Some(Path::new("/etc/scribe/secrets.json")));
        assert_eq!(path, PathBuf::from("/etc/scribe/secrets.json"));
    }
}
