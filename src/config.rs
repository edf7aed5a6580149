// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Client configuration.
//!
//! Defaults mirror the deployed frontend: a local backend on port 8000,
//! a generous 100 second request timeout, and a 5 minute refresh buffer.

use std::path::PathBuf;
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default hard timeout for backend requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// Seconds before declared expiry at which a token is considered due for
/// proactive refresh.
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 5 * 60;

/// Minimum password length accepted before any network call.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Environment variable overriding the backend base URL.
pub const ENV_API_URL: &str = "MOVIEMIND_API_URL";

/// Runtime configuration for the client core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, no trailing slash.
    pub base_url: String,
    /// Hard timeout applied to every backend request.
    pub timeout: Duration,
    /// Proactive refresh buffer. Tokens within this many seconds of expiry
    /// are refreshed ahead of use.
    pub refresh_buffer_secs: i64,
    /// Where the credential store lives. `None` means the per-user default
    /// under `~/.moviemind/`.
    pub credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let base_url = std::env::var(ENV_API_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            credentials_path: None,
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at an explicit backend URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            ..Self::default()
        }
    }

    /// Override the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the proactive refresh buffer.
    pub fn refresh_buffer_secs(mut self, secs: i64) -> Self {
        self.refresh_buffer_secs = secs;
        self
    }

    /// Override the credential store location.
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.refresh_buffer_secs, 300);
        assert!(config.credentials_path.is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ClientConfig::with_base_url("http://api.example.com/");
        assert_eq!(config.base_url, "http://api.example.com");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::with_base_url("http://x")
            .timeout(Duration::from_secs(3))
            .refresh_buffer_secs(0);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.refresh_buffer_secs, 0);
    }
}
