//! Error types for the polling client.
//!
//! None of these escape the public facade: the fetcher masks every failure
//! with a cached or empty value. They exist so the retry policy can be
//! encoded in one place instead of re-decided at each call site.

use adpulse_core::UserType;
use thiserror::Error;

/// How a failed fetch decides whether another attempt is worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry only transport-level failures (connect errors, timeouts).
    /// A well-formed HTTP error response is final. Used for auth-sensitive
    /// feeds where a 4xx will not heal by retrying.
    TransportOnly,
    /// Retry every failure except a missing token. Used for dashboard-style
    /// feeds whose empty default is harmless.
    AllFailures,
}

/// Failure taxonomy for one fetch attempt.
///
/// Transport errors carry a message rather than wrapping `reqwest::Error`
/// so scripted test sources can fabricate them.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("server rejected request with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("no bearer token available for {user_type}")]
    MissingToken { user_type: UserType },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ClientError {
    /// Map a `reqwest` failure into the taxonomy. Timeouts are split out so
    /// logs distinguish a slow server from an unreachable one; both retry.
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ClientError::Timeout { timeout_ms }
        } else {
            ClientError::Transport {
                message: err.to_string(),
            }
        }
    }

    /// Whether another attempt is worthwhile under `policy`.
    ///
    /// A missing token never retries: there is nothing to retry against.
    pub fn is_retryable(&self, policy: RetryPolicy) -> bool {
        match self {
            ClientError::MissingToken { .. } => false,
            ClientError::Transport { .. } | ClientError::Timeout { .. } => true,
            ClientError::Status { .. } | ClientError::Serde(_) => {
                policy == RetryPolicy::AllFailures
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_retries_under_both_policies() {
        let err = ClientError::Transport {
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable(RetryPolicy::TransportOnly));
        assert!(err.is_retryable(RetryPolicy::AllFailures));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ClientError::Timeout { timeout_ms: 15_000 };
        assert!(err.is_retryable(RetryPolicy::TransportOnly));
    }

    #[test]
    fn test_status_final_for_transport_only() {
        let err = ClientError::Status {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(!err.is_retryable(RetryPolicy::TransportOnly));
        assert!(err.is_retryable(RetryPolicy::AllFailures));
    }

    #[test]
    fn test_missing_token_never_retries() {
        let err = ClientError::MissingToken {
            user_type: UserType::Client,
        };
        assert!(!err.is_retryable(RetryPolicy::TransportOnly));
        assert!(!err.is_retryable(RetryPolicy::AllFailures));
    }
}
