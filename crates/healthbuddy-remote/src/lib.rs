//! HealthBuddy Remote - HTTP adapter for the sync engine
//!
//! Provides:
//! - An async JSON client for the HealthBuddy API
//! - The route table mapping queued operations onto HTTP calls
//! - [`HttpDispatcher`], the `IRemoteDispatcher` implementation that
//!   classifies every call into success, transient or permanent failure
//!
//! ## Modules
//!
//! - [`client`] - reqwest-based API client with per-request timeout
//! - [`routes`] - allowed `(method, path)` pairs
//! - [`dispatcher`] - queued operation execution and classification

pub mod client;
pub mod dispatcher;
pub mod routes;

use std::time::Duration;

use healthbuddy_core::domain::DispatchOutcome;
use reqwest::StatusCode;
use thiserror::Error;

pub use client::ApiClient;
pub use dispatcher::HttpDispatcher;

/// Errors that can occur when talking to the HealthBuddy API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached (DNS, connect, reset)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limit exceeded
    #[error("Too many requests (retry after {retry_after:?})")]
    TooManyRequests {
        /// Server hint, when provided
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx or 408)
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The server rejected the request (4xx other than 408/429)
    #[error("Rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// No route exists for the logical path
    #[error("Unknown sync path: {0}")]
    UnknownRoute(String),

    /// The path is known but does not accept this method
    #[error("Unsupported method {method} for {path}")]
    UnsupportedMethod { method: String, path: String },

    /// The base URL or a built request is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The API response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Maps an error HTTP status onto an error
    pub fn from_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::TooManyRequests { retry_after },
            StatusCode::REQUEST_TIMEOUT => ApiError::ServerError {
                status: status.as_u16(),
                message,
            },
            s if s.is_server_error() => ApiError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Rejected {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Maps a transport error, distinguishing timeouts
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout)
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }

    /// Returns true if retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_)
                | ApiError::Timeout(_)
                | ApiError::TooManyRequests { .. }
                | ApiError::ServerError { .. }
        )
    }

    /// Converts the error into a dispatch outcome
    pub fn into_outcome(self) -> DispatchOutcome {
        if self.is_transient() {
            DispatchOutcome::TransientFailure(self.to_string())
        } else {
            DispatchOutcome::PermanentFailure(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let transient = [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ];
        for status in transient {
            assert!(
                ApiError::from_status(status, String::new(), None).is_transient(),
                "{status} should be transient"
            );
        }

        let permanent = [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
            StatusCode::CONFLICT,
            StatusCode::UNPROCESSABLE_ENTITY,
        ];
        for status in permanent {
            assert!(
                !ApiError::from_status(status, String::new(), None).is_transient(),
                "{status} should be permanent"
            );
        }
    }

    #[test]
    fn test_routing_errors_are_permanent() {
        let outcome = ApiError::UnknownRoute("/nope".into()).into_outcome();
        assert_eq!(
            outcome,
            DispatchOutcome::PermanentFailure("Unknown sync path: /nope".into())
        );
        assert!(!ApiError::UnsupportedMethod {
            method: "PATCH".into(),
            path: "/goals".into()
        }
        .is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = ApiError::Timeout(Duration::from_secs(5));
        assert!(err.is_transient());
        assert!(matches!(err.into_outcome(), DispatchOutcome::TransientFailure(_)));
    }
}
