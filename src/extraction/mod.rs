//! Archive extraction for downloaded game clients
//!
//! The archive is unpacked entry by entry on the blocking pool. Cancellation is
//! polled before every entry; a cancelled or failed extraction leaves whatever
//! was already written in place.
//!
//! The most important output is the archive's top-level folder name, which the
//! caller uses to locate the freshly installed game directory.

mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use zip::{ZipExtractor, is_zip_file};

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

/// Progress snapshot reported while entries are written
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractionProgress {
    /// Percent of uncompressed bytes written, `None` for an archive of empty entries
    pub percent: Option<u8>,
    /// Uncompressed bytes written per second since the previous snapshot
    pub bytes_per_sec: f64,
}

/// Result of a completed extraction
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionSummary {
    /// First top-level folder among non-junk entries
    pub root_folder: Option<String>,
    /// False when entries live under more than one top-level folder
    pub consistent_root: bool,
    /// Number of entries processed
    pub entries: usize,
    /// Uncompressed bytes written
    pub bytes: u64,
}

/// Extract `archive_path` into `dest_path` on the blocking pool
///
/// `on_progress` runs on the blocking thread, at most once per
/// `progress_interval` plus a final call at 100%.
pub async fn extract_archive<F>(
    archive_path: &Path,
    dest_path: &Path,
    config: &ExtractionConfig,
    progress_interval: Duration,
    cancel: CancellationToken,
    on_progress: F,
) -> Result<ExtractionSummary>
where
    F: FnMut(ExtractionProgress) + Send + 'static,
{
    let extractor = ZipExtractor::new(config.junk_prefixes.clone(), progress_interval);
    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();

    spawn_blocking(move || extractor.extract(&archive_owned, &dest_owned, &cancel, on_progress))
        .await
        .map_err(|e| Error::extraction(archive_path, format!("extraction task panicked: {}", e)))?
}
