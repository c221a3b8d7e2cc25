// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for roundtable
//!
//! `RoundtableError` covers everything the crate can fail with. Provider
//! failures get their own taxonomy in [`ProviderError`] because the session
//! layer reacts differently to each kind.

use thiserror::Error;

/// Main error type for roundtable operations
#[derive(Error, Debug)]
pub enum RoundtableError {
    /// Provider-related errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(String),

    /// Malformed control messages or transport failures
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The requested session does not exist in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single provider call.
///
/// Every variant except `Cancelled` keeps the raw backend message so it can
/// be logged verbatim; user-facing text is derived separately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection refused, DNS failure, timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials rejected by the backend
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Throttled or out of quota
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Unknown or retired model id
    #[error("Model not found: {0}")]
    NotFound(String),

    /// The run was stopped by the user
    #[error("Request cancelled")]
    Cancelled,

    /// The response stream could not be decoded or ended early
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    /// No usable provider for the request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other non-success reply
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },
}

impl ProviderError {
    /// True when the error is the normal outcome of a stop command.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    /// Map a non-success HTTP reply onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        match status {
            401 | 403 => ProviderError::Auth(message),
            429 => ProviderError::RateLimited(message),
            404 => ProviderError::NotFound(message),
            _ if lower.contains("quota") || lower.contains("rate limit") => {
                ProviderError::RateLimited(message)
            }
            _ => ProviderError::Backend { status, message },
        }
    }

    /// The raw message carried by the error, if any.
    pub fn raw_message(&self) -> &str {
        match self {
            ProviderError::Transport(m)
            | ProviderError::Auth(m)
            | ProviderError::RateLimited(m)
            | ProviderError::NotFound(m)
            | ProviderError::MalformedStream(m)
            | ProviderError::Configuration(m) => m,
            ProviderError::Backend { message, .. } => message,
            ProviderError::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProviderError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return ProviderError::MalformedStream(err.to_string());
        }
        ProviderError::Transport(err.to_string())
    }
}

impl From<rusqlite::Error> for RoundtableError {
    fn from(err: rusqlite::Error) -> Self {
        RoundtableError::Store(err.to_string())
    }
}

/// Result type alias for roundtable operations
pub type Result<T> = std::result::Result<T, RoundtableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Auth("invalid x-api-key".to_string());
        assert_eq!(err.to_string(), "Authentication failed: invalid x-api-key");
    }

    #[test]
    fn test_backend_error_display() {
        let err = ProviderError::Backend {
            status: 500,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error (500): overloaded");
    }

    #[test]
    fn test_is_cancellation() {
        assert!(ProviderError::Cancelled.is_cancellation());
        assert!(!ProviderError::Transport("refused".into()).is_cancellation());
    }

    #[test]
    fn test_from_status_auth() {
        assert!(matches!(
            ProviderError::from_status(401, "bad key"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "forbidden"),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn test_from_status_rate_limited() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::RateLimited(_)
        ));
    }

    #[test]
    fn test_from_status_quota_in_body() {
        let err = ProviderError::from_status(400, "You exceeded your current quota");
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[test]
    fn test_from_status_not_found() {
        assert!(matches!(
            ProviderError::from_status(404, "model 'x' not found"),
            ProviderError::NotFound(_)
        ));
    }

    #[test]
    fn test_from_status_other() {
        let err = ProviderError::from_status(503, "unavailable");
        assert_eq!(
            err,
            ProviderError::Backend {
                status: 503,
                message: "unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_raw_message() {
        let err = ProviderError::NotFound("model gone".to_string());
        assert_eq!(err.raw_message(), "model gone");
        assert_eq!(ProviderError::Cancelled.raw_message(), "cancelled");
    }

    #[test]
    fn test_roundtable_error_from_provider() {
        let err: RoundtableError = ProviderError::Cancelled.into();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_roundtable_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RoundtableError = io.into();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_session_not_found_display() {
        let err = RoundtableError::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Session not found: abc");
    }
}
