// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Request gateway for the MovieMind backend.
//!
//! Two layers:
//!
//! - [`BackendClient`] performs one raw HTTP exchange: JSON headers, an
//!   optional bearer token, a hard per-request timeout, and structured
//!   error-body parsing.
//! - [`Gateway`] is the authenticated facade the rest of the client uses.
//!   It injects the session's token, refreshes it proactively when it is
//!   about to expire, and on a 401 performs exactly one shared refresh
//!   followed by exactly one retry.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::SessionManager;

/// HTTP methods the backend surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Attach the bearer token and enable the 401 refresh-and-retry cycle.
    pub requires_auth: bool,
    /// Suppress refresh handling. Set internally on retries and on the
    /// refresh call itself to prevent infinite loops.
    pub skip_refresh: bool,
    /// Override the client-wide timeout for this request.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options for an authenticated call.
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            ..Self::default()
        }
    }
}

/// Shape of a structured backend error body.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
    code: Option<String>,
}

/// Raw HTTP client for the backend. No session awareness.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl BackendClient {
    /// Build a client from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built, which only happens when
    /// the system TLS stack is broken. Acceptable for initialization code.
    pub fn new(config: &ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client (TLS/SSL failure)");

        Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            http,
        }
    }

    /// The configured backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one HTTP exchange against the backend.
    ///
    /// Returns the parsed JSON body on 2xx. A 2xx response whose
    /// `Content-Type` is not JSON yields an empty object, so callers
    /// expecting a body must not assume presence. Non-2xx responses become
    /// [`ApiError::Http`] with `message`/`code` lifted from a structured
    /// error body when one is present.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Patch => self.http.patch(&url),
            Method::Delete => self.http.delete(&url),
        };

        request = request.header("Content-Type", "application/json");
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request
            .timeout(timeout.unwrap_or(self.timeout))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else if e.is_connect() {
                    ApiError::Network(format!("Failed to connect to backend: {}", e))
                } else {
                    ApiError::Network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status = status.as_u16();
            let mut message = format!("HTTP {}", status);
            let mut code = status.to_string();

            if let Ok(text) = response.text().await {
                if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&text) {
                    if let Some(detail) = parsed.detail.or(parsed.message) {
                        message = detail;
                    }
                    if let Some(c) = parsed.code {
                        code = c;
                    }
                }
            }

            tracing::debug!(
                "BACKEND_ERROR | method={} endpoint={} status={} code={}",
                method.as_str(),
                endpoint,
                status,
                code
            );
            return Err(ApiError::Http {
                status,
                code,
                message,
            });
        }

        let is_json = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Network(format!("Invalid response body: {}", e)))
    }
}

/// Authenticated facade over [`BackendClient`] and the session.
#[derive(Clone)]
pub struct Gateway {
    session: SessionManager,
    backend: BackendClient,
}

impl Gateway {
    /// Wrap a session manager. The underlying HTTP client is shared with it.
    pub fn new(session: SessionManager) -> Self {
        let backend = session.backend().clone();
        Self { session, backend }
    }

    /// The session this gateway authenticates with.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Perform a request, decoding the JSON body into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = self.request_value(method, endpoint, body, opts).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Network(format!("Invalid response body: {}", e)))
    }

    /// Perform a request, returning the raw JSON body.
    pub async fn request_value(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        opts: RequestOptions,
    ) -> Result<Value, ApiError> {
        // Proactive refresh: don't send a token that is about to expire.
        if opts.requires_auth && !opts.skip_refresh && self.session.should_refresh() {
            self.session.refresh().await?;
        }

        let result = self.dispatch(method, endpoint, body.as_ref(), &opts).await;

        match result {
            Err(ApiError::Http { status: 401, .. })
                if opts.requires_auth && !opts.skip_refresh =>
            {
                tracing::debug!(
                    "GATEWAY_401 | endpoint={} action=refresh_and_retry",
                    endpoint
                );
                if self.session.refresh().await.is_err() {
                    // Session teardown already happened inside refresh().
                    return Err(ApiError::AuthExpired);
                }
                let retry_opts = RequestOptions {
                    skip_refresh: true,
                    ..opts
                };
                match self
                    .dispatch(method, endpoint, body.as_ref(), &retry_opts)
                    .await
                {
                    // A fresh token that still gets rejected means the
                    // session is truly gone. Never loop.
                    Err(ApiError::Http { status: 401, .. }) => {
                        self.session.handle_expiry();
                        Err(ApiError::AuthExpired)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        opts: &RequestOptions,
    ) -> Result<Value, ApiError> {
        let bearer = if opts.requires_auth {
            self.session.access_token()
        } else {
            None
        };
        self.backend
            .send(method, endpoint, body, bearer.as_deref(), opts.timeout)
            .await
    }

    /// GET shorthand.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Get, endpoint, None, opts).await
    }

    /// POST shorthand.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Post, endpoint, Some(body), opts).await
    }

    /// PUT shorthand.
    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Put, endpoint, Some(body), opts).await
    }

    /// DELETE shorthand.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Delete, endpoint, None, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn test_authenticated_options() {
        let opts = RequestOptions::authenticated();
        assert!(opts.requires_auth);
        assert!(!opts.skip_refresh);
        assert!(opts.timeout.is_none());
    }

    #[test]
    fn test_error_body_parsing() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"Invalid credentials","code":"BAD_LOGIN"}"#).unwrap();
        assert_eq!(body.detail.as_deref(), Some("Invalid credentials"));
        assert_eq!(body.code.as_deref(), Some("BAD_LOGIN"));
        assert!(body.message.is_none());
    }
}
