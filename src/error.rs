//! # Conformance Error Types
//!
//! Unified error taxonomy for transport clients, response normalization and
//! conformance assertions. Every variant carries the offending values so a
//! failing test reports expected vs. actual without extra logging.

use thiserror::Error;

/// Conformance operation result type
pub type ConformanceResult<T> = Result<T, ConformanceError>;

/// Error types for conformance runs
#[derive(Debug, Error)]
pub enum ConformanceError {
    /// The endpoint could not be reached within the configured timeout.
    #[error("Connection failed: {endpoint} - {reason}")]
    Connection { endpoint: String, reason: String },

    /// The request was rejected as malformed (shape/dtype the server does not accept).
    #[error("Malformed request: {0}")]
    Request(String),

    /// The server reported a failure, e.g. model not found or not yet available.
    #[error("Service error: {code} - {message}")]
    Service { code: String, message: String },

    /// The server answered with a structurally invalid response.
    #[error("Non-conformant response: {field} - {reason}")]
    Normalization { field: String, reason: String },

    /// A normalized value differs from its expectation.
    #[error("{check}: expected {expected}, got {actual}")]
    Mismatch {
        check: String,
        expected: String,
        actual: String,
    },

    /// The server reported a (state, error_code) pair with no canonical message.
    #[error("No canonical status message registered for state {state}, error_code {error_code}")]
    UnregisteredStatus { state: i32, error_code: i32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConformanceError {
    /// Create a connection error for an unreachable endpoint
    pub fn connection(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a server-reported error
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a normalization error for a structurally invalid response
    ///
    /// Use this when a response is missing required fields or carries data
    /// inconsistent with its own shape metadata. Such responses are never
    /// defaulted.
    pub fn normalization(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Normalization {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an assertion mismatch, rendering both sides with `Debug`
    pub fn mismatch(
        check: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::Mismatch {
            check: check.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short label of the taxonomy bucket, used in reports and logs
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ConformanceError::Connection { .. } => "connection",
            ConformanceError::Request(_) => "request",
            ConformanceError::Service { .. } => "service",
            ConformanceError::Normalization { .. } | ConformanceError::Serialization(_) => {
                "normalization"
            }
            ConformanceError::Mismatch { .. } => "mismatch",
            ConformanceError::UnregisteredStatus { .. } => "unregistered_status",
            ConformanceError::Config(_) | ConformanceError::Io(_) => "config",
        }
    }

    /// Check if the error means the server itself is non-conformant
    ///
    /// Connection, request and configuration failures point at the
    /// environment or the harness instead.
    #[must_use]
    pub fn is_conformance_failure(&self) -> bool {
        matches!(
            self,
            ConformanceError::Normalization { .. }
                | ConformanceError::Serialization(_)
                | ConformanceError::Mismatch { .. }
                | ConformanceError::UnregisteredStatus { .. }
        )
    }
}

/// Convert tonic Status to ConformanceError
impl From<tonic::Status> for ConformanceError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable | tonic::Code::DeadlineExceeded => {
                ConformanceError::Connection {
                    endpoint: "gRPC".to_string(),
                    reason: format!("{:?}: {}", status.code(), status.message()),
                }
            }
            // Per-call deadline elapsed on either side of the channel
            tonic::Code::Cancelled
                if status.message() == tonic::TimeoutExpired(()).to_string() =>
            {
                ConformanceError::Connection {
                    endpoint: "gRPC".to_string(),
                    reason: status.message().to_string(),
                }
            }
            tonic::Code::InvalidArgument | tonic::Code::OutOfRange => {
                ConformanceError::Request(status.message().to_string())
            }
            code => ConformanceError::Service {
                code: format!("{code:?}"),
                message: status.message().to_string(),
            },
        }
    }
}

/// Convert reqwest errors raised before a status code is available
impl From<reqwest::Error> for ConformanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            let endpoint = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "REST".to_string());
            ConformanceError::Connection {
                endpoint,
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            ConformanceError::normalization("body", err.to_string())
        } else {
            ConformanceError::Request(err.to_string())
        }
    }
}
