use crate::error::{Error, Result};
use crate::progress::{PercentTracker, ProgressThrottle, SpeedSampler};
use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ExtractionProgress, ExtractionSummary};

/// Check whether a file is a readable ZIP container
pub fn is_zip_file(path: &Path) -> bool {
    match std::fs::File::open(path) {
        Ok(file) => zip::ZipArchive::new(file).is_ok(),
        Err(e) => {
            warn!(?path, error = %e, "failed to open file while checking for ZIP");
            false
        }
    }
}

/// Archive extractor for ZIP files
pub struct ZipExtractor {
    junk_prefixes: Vec<String>,
    progress_interval: Duration,
}

impl ZipExtractor {
    /// Create an extractor ignoring `junk_prefixes` when looking for the root folder
    pub fn new(junk_prefixes: Vec<String>, progress_interval: Duration) -> Self {
        Self {
            junk_prefixes,
            progress_interval,
        }
    }

    fn is_junk(&self, top_level: &str) -> bool {
        self.junk_prefixes
            .iter()
            .any(|prefix| top_level.starts_with(prefix.as_str()))
    }

    /// Top-level folder of an entry, if the entry lives inside one
    ///
    /// Plain files at the archive root are not folders and yield `None`.
    fn top_level_folder(path: &Path, is_dir: bool) -> Option<String> {
        let mut components = path.components();
        let first = match components.next()? {
            Component::Normal(name) => name.to_string_lossy().into_owned(),
            _ => return None,
        };
        if components.next().is_none() && !is_dir {
            return None;
        }
        Some(first)
    }

    fn open_archive(archive_path: &Path) -> Result<zip::ZipArchive<std::fs::File>> {
        let file = std::fs::File::open(archive_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open ZIP archive: {}", e),
            ))
        })?;

        zip::ZipArchive::new(file).map_err(|e| {
            Error::extraction(archive_path, format!("failed to read ZIP archive: {}", e))
        })
    }

    /// Sum of declared uncompressed sizes, read from the central directory only
    fn total_size(archive: &mut zip::ZipArchive<std::fs::File>, archive_path: &Path) -> Result<u64> {
        let mut total = 0u64;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| {
                Error::extraction(archive_path, format!("failed to read ZIP entry {}: {}", i, e))
            })?;
            total = total.saturating_add(entry.size());
        }
        Ok(total)
    }

    /// Write a single entry below `dest_path`, creating directories as needed
    fn extract_entry(file: &mut zip::read::ZipFile<'_>, file_path: &Path) -> Result<()> {
        if file.is_dir() {
            std::fs::create_dir_all(file_path).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to create directory {}: {}", file_path.display(), e),
                ))
            })?;
            return Ok(());
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to create parent directories: {}", e),
                ))
            })?;
        }

        let mut outfile = std::fs::File::create(file_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to create output file {}: {}", file_path.display(), e),
            ))
        })?;

        std::io::copy(file, &mut outfile).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to extract {}: {}", file_path.display(), e),
            ))
        })?;

        Ok(())
    }

    /// Extract every entry of `archive_path` into `dest_path`
    ///
    /// Progress percent stays below 100 until the last entry is written.
    pub fn extract<F>(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ExtractionSummary>
    where
        F: FnMut(ExtractionProgress),
    {
        debug!(?archive_path, ?dest_path, "starting ZIP extraction");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to create destination: {}", e),
            ))
        })?;

        let mut archive = Self::open_archive(archive_path)?;
        let total = Self::total_size(&mut archive, archive_path)?;

        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut sampler = SpeedSampler::new(0);
        let mut percent = PercentTracker::default();

        let mut summary = ExtractionSummary {
            consistent_root: true,
            ..Default::default()
        };
        let mut top_levels = BTreeSet::new();

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                info!(?archive_path, extracted = summary.entries, "extraction cancelled");
                return Err(Error::Cancelled);
            }

            let mut file = archive.by_index(i).map_err(|e| {
                Error::extraction(archive_path, format!("failed to read ZIP entry {}: {}", i, e))
            })?;

            let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
                warn!(name = file.name(), "skipping entry with unsafe path");
                continue;
            };

            if let Some(folder) = Self::top_level_folder(&relative, file.is_dir()) {
                if !self.is_junk(&folder) {
                    if summary.root_folder.is_none() {
                        debug!(folder = %folder, "archive root folder detected");
                        summary.root_folder = Some(folder.clone());
                    }
                    top_levels.insert(folder);
                }
            }

            Self::extract_entry(&mut file, &dest_path.join(&relative))?;
            summary.entries += 1;
            summary.bytes = summary.bytes.saturating_add(file.size());

            if throttle.should_emit() {
                on_progress(ExtractionProgress {
                    percent: percent.update(summary.bytes, total, 99),
                    bytes_per_sec: sampler.sample(summary.bytes),
                });
            }
        }

        if top_levels.len() > 1 {
            summary.consistent_root = false;
            warn!(
                ?archive_path,
                root = ?summary.root_folder,
                folders = ?top_levels,
                "archive has more than one top-level folder"
            );
        }

        on_progress(ExtractionProgress {
            percent: Some(percent.complete()),
            bytes_per_sec: sampler.sample(summary.bytes),
        });

        info!(
            ?archive_path,
            entries = summary.entries,
            bytes = summary.bytes,
            root = ?summary.root_folder,
            "ZIP extraction successful"
        );

        Ok(summary)
    }
}
