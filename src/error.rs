// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

//! Client error taxonomy.
//!
//! Every fallible operation in the session, gateway, social, and discovery
//! modules surfaces one of these variants so callers can branch on the
//! failure class instead of parsing messages.

/// Errors surfaced by the MovieMind client.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Input rejected locally, before any network call.
    Validation(String),
    /// The backend rejected the supplied credentials.
    Auth(String),
    /// Generic non-2xx response.
    Http {
        status: u16,
        code: String,
        message: String,
    },
    /// The request exceeded its deadline.
    Timeout,
    /// A 401 was received and the refresh-and-retry cycle also failed.
    AuthExpired,
    /// Transport-level failure, no HTTP response was received.
    Network(String),
}

impl ApiError {
    /// Build an HTTP error with a status-derived message and code.
    pub fn from_status(status: u16) -> Self {
        Self::Http {
            status,
            code: status.to_string(),
            message: format!("HTTP {}", status),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::AuthExpired => Some(401),
            Self::Timeout => Some(408),
            _ => None,
        }
    }

    /// True for errors that mean the backend considered the caller
    /// unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthExpired) || self.status() == Some(401)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            Self::Http {
                status, message, ..
            } => write!(f, "HTTP {}: {}", status, message),
            Self::Timeout => write!(f, "Request timed out"),
            Self::AuthExpired => write!(f, "Authentication expired"),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_derives_message() {
        let err = ApiError::from_status(503);
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(ApiError::AuthExpired.is_unauthorized());
        assert!(ApiError::from_status(401).is_unauthorized());
        assert!(!ApiError::Timeout.is_unauthorized());
        assert!(!ApiError::Network("down".into()).is_unauthorized());
    }
}
