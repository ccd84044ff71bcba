//! Error types for launcher-dl
//!
//! Every failure inside a worker is eventually turned into exactly one
//! [`Event::Failed`](crate::types::Event::Failed). This module provides:
//! - The crate-wide [`Error`] enum with contextual variants
//! - Classification helpers (cancellation, HTTP status)
//! - The [`Result`] alias used throughout the library

use crate::types::JobId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for launcher-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message carried by the terminal event of a cancelled job
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Main error type for launcher-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// The source URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// A job is already running; the controller accepts one at a time
    #[error("job {job} is already active")]
    AlreadyActive {
        /// The job currently holding the active slot
        job: JobId,
    },

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server returned HTTP {status}")]
    Http {
        /// The HTTP status code
        status: u16,
    },

    /// A partial-content response does not continue the local file
    #[error("server resumed at {}, expected byte {expected}", actual.map_or_else(|| "an unknown offset".to_string(), |a| format!("byte {}", a)))]
    RangeMismatch {
        /// Length of the local partial file
        expected: u64,
        /// First byte announced by `Content-Range`, if parseable
        actual: Option<u64>,
    },

    /// No bytes arrived within the stall timeout
    #[error("transfer stalled: no progress for {}s", after.as_secs())]
    Stalled {
        /// How long the transfer went without progress
        after: Duration,
    },

    /// Retry budget exhausted without completing the download
    #[error("max retries reached after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Display form of the last transient error
        last_error: String,
    },

    /// Not enough free space for the remaining bytes
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes still to be written
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Archive extraction failed
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job was cancelled by the caller
    #[error("cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true if this error represents a user-initiated stop
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Message used for the terminal event of a failed job
    pub fn terminal_message(&self) -> String {
        if self.is_cancelled() {
            CANCELLED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    pub(crate) fn extraction(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Error::Io(io),
            other => Error::Other(format!("zip error: {}", other)),
        }
    }
}
