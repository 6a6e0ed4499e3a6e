//! Error types for blazer
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] enum and [`Result`] alias
//! - [`ApiError`], the structured error body returned by the storage service
//! - [`TransferError`], failures of the multipart transfer engine itself

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blazer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blazer
///
/// Each variant carries enough context to print a single-line summary to the user.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "transfer.threads")
        key: Option<String>,
    },

    /// Credentials file missing or incomplete
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Local I/O error (unreadable source, unwritable destination, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (connect, TLS, body stream)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-2xx response from the storage service
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Multipart transfer engine failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Bucket or file not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Generic error for cases not covered by specific variants
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Error body returned by the storage service for any non-2xx response
///
/// # Example JSON Response
///
/// ```json
/// {
///   "status": 400,
///   "code": "bad_request",
///   "message": "fileId is invalid"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{status} {code} - {message}")]
pub struct ApiError {
    /// HTTP status code
    #[serde(default)]
    pub status: u16,
    /// Machine-readable error code (e.g., "bad_auth_token", "service_unavailable")
    #[serde(default)]
    pub code: String,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build an error from a failed response body
    ///
    /// The service normally answers with a JSON error document. Proxies and load
    /// balancers do not, so a non-JSON body is kept verbatim as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiError>(body) {
            Ok(mut err) => {
                // The HTTP status line is authoritative.
                err.status = status;
                err
            }
            Err(_) => Self::new(status, "unknown", body.trim()),
        }
    }

    /// True for 5xx responses
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Failures of the multipart transfer engine
#[derive(Debug, Error)]
pub enum TransferError {
    /// File metadata returned for a different id than the one requested
    #[error("file id mismatch: requested {expected}, service returned {actual}")]
    FileIdMismatch {
        /// The requested file id
        expected: String,
        /// The id in the returned metadata
        actual: String,
    },

    /// The download scratch path exists but is not a directory
    #[error("scratch path {path} exists and is not a directory")]
    ScratchNotDirectory {
        /// Offending path
        path: PathBuf,
    },

    /// One or more parts of a multipart transfer did not complete
    #[error("{failed} of {total} parts failed: {first_error}")]
    PartsFailed {
        /// Number of parts that did not succeed
        failed: usize,
        /// Total number of parts in the plan
        total: usize,
        /// Message of the lowest-indexed failure
        first_error: String,
    },

    /// Task submitted to a pool that is draining or stopped
    #[error("worker pool is no longer accepting tasks")]
    PoolClosed,

    /// Downloaded content does not hash to the checksum the service reported
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Local file that failed verification
        path: PathBuf,
        /// SHA-1 reported by the service
        expected: String,
        /// SHA-1 of the bytes received
        actual: String,
    },

    /// A ranged download returned fewer or more bytes than requested
    #[error("part {index} received {actual} bytes, expected {expected}")]
    ShortPart {
        /// Part index
        index: usize,
        /// Range length
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_parses_service_json_body() {
        let body = r#"{"status":400,"code":"bad_request","message":"fileId is invalid"}"#;
        let err = ApiError::from_body(400, body);

        assert_eq!(err.status, 400);
        assert_eq!(err.code, "bad_request");
        assert_eq!(err.message, "fileId is invalid");
        assert!(!err.is_server_error());
    }

    #[test]
    fn api_error_keeps_http_status_over_body_status() {
        let body = r#"{"status":200,"code":"service_unavailable","message":"busy"}"#;
        let err = ApiError::from_body(503, body);

        assert_eq!(err.status, 503);
        assert!(err.is_server_error());
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = ApiError::from_body(502, "<html>Bad Gateway</html>\n");

        assert_eq!(err.code, "unknown");
        assert_eq!(err.message, "<html>Bad Gateway</html>");
        assert!(err.is_server_error());
    }

    #[test]
    fn api_error_display_matches_summary_format() {
        let err = ApiError::new(401, "bad_auth_token", "Invalid authorization token");
        assert_eq!(
            err.to_string(),
            "401 bad_auth_token - Invalid authorization token"
        );
    }

    #[test]
    fn parts_failed_display_includes_counts() {
        let err = Error::from(TransferError::PartsFailed {
            failed: 2,
            total: 7,
            first_error: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "transfer error: 2 of 7 parts failed: boom");
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("transfer.threads", "must be at least 1") {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("transfer.threads"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
