//! Error types for blog-image-archiver
//!
//! Two layers of errors live here:
//! - [`Error`] covers run-level failures (configuration, preconditions, database).
//!   These abort a run and map to a process exit code through [`ToExitCode`].
//! - [`FetchError`] and [`StoreError`] are per-URL failures. The orchestrator
//!   converts them into an [`Outcome`](crate::types::Outcome) and carries on with
//!   the next URL, so they never abort a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blog-image-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blog-image-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "burn.threshold")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session context (cookie jar) is absent or unreadable
    #[error("session context not readable at {}: {reason}", path.display())]
    SessionMissing {
        /// Where the cookie jar was expected
        path: PathBuf,
        /// Why it could not be used
        reason: String,
    },

    /// The session context was loaded but the origin rejects it
    #[error("session rejected by origin: {reason}")]
    SessionInvalid {
        /// Why the session is considered invalid
        reason: String,
    },

    /// The input corpus is absent
    #[error("corpus not found at {}", path.display())]
    CorpusMissing {
        /// Where the corpus was expected
        path: PathBuf,
    },

    /// The input corpus exists but could not be decoded
    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Transport-level failure while fetching one URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Origin answered with a non-2xx status (after redirects)
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, DNS, TLS, timeout or body read failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The URL could not be turned into a request
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None if e.is_builder() => FetchError::InvalidUrl(e.to_string()),
            None => FetchError::Transport(e.to_string()),
        }
    }
}

/// Local storage failure while persisting one image
#[derive(Debug, Error)]
pub enum StoreError {
    /// The URL does not map to a safe relative path under the output root
    #[error("cannot derive a storage path for {url}: {reason}")]
    InvalidPath {
        /// The offending URL
        url: String,
        /// Why no path could be derived
        reason: String,
    },

    /// Writing, syncing or renaming failed
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// The path being written (temporary or final)
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Map run-level errors to process exit codes
///
/// Each precondition failure gets its own code so wrapper scripts can tell a
/// missing cookie jar from a rejected one.
pub trait ToExitCode {
    /// Get the process exit code for this error
    fn exit_code(&self) -> i32;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::CorpusMissing { .. } | Error::InvalidCorpus(_) => 1,
            Error::Config { .. } => 2,
            Error::Database(_) | Error::Sqlx(_) => 3,
            Error::SessionMissing { .. } => 111,
            Error::SessionInvalid { .. } => 112,
            Error::Io(_) | Error::Network(_) | Error::Serialization(_) | Error::Other(_) => 70,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preconditions_have_distinct_exit_codes() {
        let cases = vec![
            (
                Error::SessionMissing {
                    path: PathBuf::from("cookies.txt"),
                    reason: "not found".into(),
                },
                111,
            ),
            (
                Error::SessionInvalid {
                    reason: "login wall".into(),
                },
                112,
            ),
            (
                Error::CorpusMissing {
                    path: PathBuf::from("posts.json"),
                },
                1,
            ),
            (Error::InvalidCorpus("trailing comma".into()), 1),
            (
                Error::Config {
                    message: "threshold must be at least 1".into(),
                    key: Some("burn.threshold".into()),
                },
                2,
            ),
            (
                Error::Database(DatabaseError::ConnectionFailed("locked".into())),
                3,
            ),
            (Error::Other("boom".into()), 70),
        ];

        for (error, expected) in cases {
            assert_eq!(error.exit_code(), expected, "wrong exit code for {error}");
        }
    }

    #[test]
    fn session_missing_message_names_the_path() {
        let err = Error::SessionMissing {
            path: PathBuf::from("/tmp/cookies.txt"),
            reason: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cookies.txt"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn fetch_error_display_is_compact() {
        assert_eq!(FetchError::Status(404).to_string(), "HTTP status 404");
        assert_eq!(
            FetchError::Transport("connection refused".into()).to_string(),
            "transport failure: connection refused"
        );
    }

    #[test]
    fn store_error_keeps_io_source() {
        let err = StoreError::Io {
            path: PathBuf::from("images/a.jpg.tmp"),
            source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
        };
        assert!(err.to_string().contains("images/a.jpg.tmp"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
