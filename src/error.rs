//! Error types.

use thiserror::Error;

/// Result alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors returned by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A domain list could not be fetched after all retry attempts.
    #[error("failed to fetch {locator}: {source}")]
    Fetch {
        /// The locator of the list that failed.
        locator: String,
        /// The last transport failure.
        #[source]
        source: TransportError,
    },

    /// A list includes itself, directly or through other lists.
    #[error("include cycle: {path}")]
    IncludeCycle {
        /// The full include path, e.g. `a -> b -> a`.
        path: String,
    },

    /// Invalid caller-supplied options.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Filesystem or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON configuration file could not be decoded.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The router rejected a command.
    #[error("router command `{command}` failed: {message}")]
    Router {
        /// The command line that failed.
        command: String,
        /// Output reported by the router CLI.
        message: String,
    },

    /// The overall run deadline elapsed before planning finished.
    #[error("run deadline of {after_ms}ms exceeded")]
    DeadlineExceeded {
        /// The configured deadline.
        after_ms: u64,
    },
}

impl SyncError {
    /// Returns `true` for failures worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

/// Failures of a single fetch attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed (connect, TLS, body decoding).
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status {
        /// Numeric HTTP status.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The attempt did not complete in time.
    #[error("timeout after {after_ms}ms for {url}")]
    Timeout {
        /// Timeout applied to the attempt.
        after_ms: u64,
        /// Requested URL.
        url: String,
    },

    /// Any other fetcher-specific failure.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_mentions_locator_and_cause() {
        let err = SyncError::Fetch {
            locator: "https://lists.test/missing".into(),
            source: TransportError::Status {
                status: 404,
                url: "https://lists.test/missing".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch https://lists.test/missing: HTTP 404 for https://lists.test/missing"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn cycle_is_not_retryable() {
        let err = SyncError::IncludeCycle {
            path: "a -> b -> a".into(),
        };
        assert_eq!(err.to_string(), "include cycle: a -> b -> a");
        assert!(!err.is_retryable());
    }
}
