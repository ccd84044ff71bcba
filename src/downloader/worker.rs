//! One install job from submission to its terminal event.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extraction::{self, ExtractionSummary};
use crate::types::Phase;
use crate::utils::check_directory_writable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ActiveSlot;
use super::sink::EventSink;
use super::transfer::Transfer;

/// Background job state, moved onto the worker pool by [`Installer::start`](super::Installer::start)
pub(crate) struct Worker {
    pub(crate) sink: EventSink,
    pub(crate) url: String,
    pub(crate) destination: PathBuf,
    pub(crate) config: Arc<Config>,
    pub(crate) client: reqwest::Client,
    pub(crate) cancel: CancellationToken,
    pub(crate) active: ActiveSlot,
}

impl Worker {
    /// Run the job and report its outcome
    ///
    /// The active slot is released before the terminal event goes out, so a
    /// subscriber reacting to the terminal event can immediately start the next job.
    pub(crate) async fn run(self) {
        let job = self.sink.job();
        let outcome = self.execute().await;

        self.active.release(job, self.sink.sender());

        match outcome {
            Ok(summary) => {
                info!(
                    job = job.0,
                    folder = ?summary.root_folder,
                    entries = summary.entries,
                    bytes = summary.bytes,
                    "install complete"
                );
                self.sink.extract_complete(summary.root_folder);
            }
            Err(e) if e.is_cancelled() => {
                info!(job = job.0, "install cancelled");
                self.sink.failed(&e);
            }
            Err(e) => {
                error!(job = job.0, error = %e, "install failed");
                self.sink.failed(&e);
            }
        }
    }

    async fn execute(&self) -> Result<ExtractionSummary> {
        let job = self.sink.job().0;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.prepare_destination().await?;
        let archive = self.create_temp_file().await?;
        debug!(job, path = ?archive, "temp file created");

        // The temp file is removed when `archive` drops, on every exit path
        Transfer::new(
            &self.client,
            &self.url,
            &archive,
            &self.config,
            &self.cancel,
            &self.sink,
        )
        .run()
        .await?;
        self.sink.download_complete();

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let archive_path = archive.to_path_buf();
        let is_zip = tokio::task::spawn_blocking(move || extraction::is_zip_file(&archive_path))
            .await
            .unwrap_or(false);
        if !is_zip {
            return Err(Error::extraction(
                &archive,
                "downloaded file is not a zip archive",
            ));
        }

        info!(job, destination = ?self.destination, "extracting archive");
        let sink = self.sink.clone();
        let summary = extraction::extract_archive(
            &archive,
            &self.destination,
            &self.config.extraction,
            self.config.download.progress_interval,
            self.cancel.clone(),
            move |p| sink.progress(p.percent, p.bytes_per_sec, Phase::Extracting),
        )
        .await?;

        if let Err(e) = archive.close() {
            warn!(job, error = %e, "failed to remove temp archive");
        }
        Ok(summary)
    }

    /// Create the destination and make sure it accepts writes
    async fn prepare_destination(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.destination).await?;

        let dir = self.destination.clone();
        tokio::task::spawn_blocking(move || check_directory_writable(&dir))
            .await
            .map_err(|e| Error::Other(format!("permission check panicked: {}", e)))?
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "destination {} is not writable: {}",
                        self.destination.display(),
                        e
                    ),
                ))
            })
    }

    /// Allocate a unique archive path in the configured temp directory
    async fn create_temp_file(&self) -> Result<TempPath> {
        let dir = self.config.download.temp_dir();
        tokio::fs::create_dir_all(&dir).await?;

        tokio::task::spawn_blocking(move || new_temp_path(&dir))
            .await
            .map_err(|e| Error::Other(format!("temp file creation panicked: {}", e)))?
    }
}

fn new_temp_path(dir: &Path) -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("launcher-dl-")
        .suffix(".zip")
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}
