//! Configuration types for launcher-dl
//!
//! Everything the installer needs is passed in explicitly through [`Config`]
//! when the [`Installer`](crate::Installer) is constructed; nothing is read from
//! process-wide state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Transfer settings for the download phase
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory for the in-progress archive (default: OS temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Write buffer size in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum interval between progress events (default: 500ms)
    #[serde(default = "default_progress_interval", with = "duration_ms_serde")]
    pub progress_interval: Duration,

    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_ms_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Refuse to download when the temp directory lacks room for the archive (default: true)
    #[serde(default = "default_true")]
    pub check_disk_space: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            chunk_size: default_chunk_size(),
            progress_interval: default_progress_interval(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            check_disk_space: true,
        }
    }
}

impl DownloadConfig {
    /// Directory the temp archive is created in
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Retry configuration for transient failures
///
/// Retries use a fixed delay. An attempt that moved the download forward
/// before failing resets the attempt counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts without progress (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_ms_serde")]
    pub retry_delay: Duration,

    /// Time without any received byte before the transfer counts as stalled (default: 30 seconds)
    #[serde(default = "default_stall_timeout", with = "duration_ms_serde")]
    pub stall_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            stall_timeout: default_stall_timeout(),
        }
    }
}

/// Extraction settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Top-level entry prefixes that never count as the archive root (default: ["__MACOSX"])
    #[serde(default = "default_junk_prefixes")]
    pub junk_prefixes: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            junk_prefixes: default_junk_prefixes(),
        }
    }
}

/// Worker pool settings for the installer-owned runtime
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Async worker threads (default: 4)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Upper bound for blocking threads used by extraction (default: 16)
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            max_blocking_threads: default_max_blocking_threads(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for [`Installer`](crate::Installer)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry and stall detection
    #[serde(default)]
    pub retry: RetryConfig,

    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Worker pool and event channel
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Config {
    /// Check values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "at least one attempt is required",
                "retry.max_attempts",
            ));
        }
        if self.retry.stall_timeout.is_zero() {
            return Err(Error::config(
                "stall timeout must be positive",
                "retry.stall_timeout",
            ));
        }
        if self.download.chunk_size == 0 {
            return Err(Error::config(
                "chunk size must be positive",
                "download.chunk_size",
            ));
        }
        if self.download.progress_interval.is_zero() {
            return Err(Error::config(
                "progress interval must be positive",
                "download.progress_interval",
            ));
        }
        if self.pool.worker_threads == 0 {
            return Err(Error::config(
                "at least one worker thread is required",
                "pool.worker_threads",
            ));
        }
        if self.pool.max_blocking_threads == 0 {
            return Err(Error::config(
                "at least one blocking thread is required",
                "pool.max_blocking_threads",
            ));
        }
        if self.pool.event_buffer == 0 {
            return Err(Error::config(
                "event buffer must hold at least one event",
                "pool.event_buffer",
            ));
        }
        Ok(())
    }
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("launcher-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_junk_prefixes() -> Vec<String> {
    vec!["__MACOSX".to_string()]
}

fn default_worker_threads() -> usize {
    4
}

fn default_max_blocking_threads() -> usize {
    16
}

fn default_event_buffer() -> usize {
    1000
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
