//! Retry classification and the bounded attempt budget
//!
//! The download phase retries transient failures with a fixed delay. An
//! attempt that moved the transfer forward before failing resets the budget,
//! so a slow but progressing download is never abandoned, while one that is
//! fully stuck fails after `max_attempts` attempts.
//!
//! # Example
//!
//! ```
//! use launcher_dl::config::RetryConfig;
//! use launcher_dl::retry::{RetryBudget, RetryDecision};
//!
//! let mut budget = RetryBudget::new(&RetryConfig::default());
//! assert!(matches!(budget.record_failure(), RetryDecision::RetryAfter(_)));
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, stalls, 5xx) return `true`.
/// Permanent failures (404, disk full, corrupt archive, cancellation) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            Error::Http { status } => is_retryable_status(*status),
            // No progress inside the stall window is the canonical transient failure
            Error::Stalled { .. } => true,
            // The partial file is discarded first, so the next attempt starts clean
            Error::RangeMismatch { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Cancelled => false,
            Error::RetriesExhausted { .. } => false,
            Error::InsufficientSpace { .. } => false,
            Error::Extraction { .. } => false,
            Error::Config { .. } => false,
            Error::InvalidUrl { .. } => false,
            Error::AlreadyActive { .. } => false,
            Error::Other(_) => false,
        }
    }
}

/// Whether an HTTP status is worth another attempt
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Outcome of recording a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    RetryAfter(Duration),
    /// Budget used up; give up after this many attempts
    Exhausted {
        /// Attempts made without progress
        attempts: u32,
    },
}

/// Fixed-delay attempt counter
#[derive(Clone, Debug)]
pub struct RetryBudget {
    max_attempts: u32,
    delay: Duration,
    attempts: u32,
}

impl RetryBudget {
    /// Create a budget from configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay,
            attempts: 0,
        }
    }

    /// Count one failed attempt and decide whether to try again
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            RetryDecision::Exhausted {
                attempts: self.attempts,
            }
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }

    /// Forget earlier failures after the transfer made progress
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Failed attempts recorded since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Sleep for `delay` unless the token fires first
pub(crate) async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
