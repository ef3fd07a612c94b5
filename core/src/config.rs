//! Client configuration.
//!
//! `ClientConfig` is plain data: build it in code, deserialize it from any
//! serde format, or read it from the environment. It is consumed by
//! [`Jenkins::new`](crate::Jenkins::new) and never changes afterwards.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Connection settings for one server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Send a CSRF crumb with requests that ask for one.
    #[serde(default)]
    pub maybe_add_crumb: bool,
    /// Per-request timeout in milliseconds. `0` disables the timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

/// Retry a request when the server answers with a 5xx status.
///
/// Fixed delay between attempts, no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    pub times: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            maybe_add_crumb: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: None,
        }
    }

    #[must_use]
    pub fn with_crumb(mut self, enabled: bool) -> Self {
        self.maybe_add_crumb = enabled;
        self
    }

    /// Per-request timeout. A zero duration disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// The request timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Read `JENKINS_URL`, `JENKINS_USER`, `JENKINS_PASSWORD` and
    /// `JENKINS_CRUMB`. Returns `None` when `JENKINS_URL` is unset.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let base_url = lookup("JENKINS_URL")?;
        let username = lookup("JENKINS_USER").unwrap_or_default();
        let password = lookup("JENKINS_PASSWORD").unwrap_or_default();
        let crumb = lookup("JENKINS_CRUMB")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Some(Self::new(&base_url, &username, &password).with_crumb(crumb))
    }

    /// `base_url` with exactly one trailing slash.
    pub fn normalized_base_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}
