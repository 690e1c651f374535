//! Wikibase client configuration.

use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent sent with every API request.
pub const DEFAULT_USER_AGENT: &str = concat!("scribe/", env!("CARGO_PKG_VERSION"));

/// Bounded retry with exponential backoff for transport failures.
///
/// Only transport-level failures are retried. A well-formed API answer
/// (including `success = 0`) is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// Doubles per attempt, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Configuration for a Wikibase API session.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    /// Action API endpoint, e.g. `https://portal.mardi4nfdi.de/w/api.php`.
    pub api_url: String,

    /// Optional proxy applied to every request (`host:port` or a full URL).
    pub proxy: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Retry policy for transport failures.
    pub retry: RetryPolicy,

    /// User agent header.
    pub user_agent: String,
}

impl WikiConfig {
    /// Create a config for the given endpoint with default settings.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Route all requests through a proxy.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Proxy URL. Bare `host:port` gets an `http://` scheme; only http and
    /// https proxies are supported.
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy.as_deref().map(|p| {
            let p = p.trim();
            if p.contains("://") {
                p.to_string()
            } else {
                format!("http://{}", p)
            }
        })
    }
}
