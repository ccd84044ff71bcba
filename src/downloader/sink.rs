//! Event emission for one job.

use crate::error::Error;
use crate::types::{Event, JobId, Phase};
use crate::utils::format_speed;
use tokio::sync::broadcast;

/// Sends events tagged with a job id; a send with no subscribers is not an error
#[derive(Clone)]
pub(crate) struct EventSink {
    job: JobId,
    tx: broadcast::Sender<Event>,
}

impl EventSink {
    pub(crate) fn new(job: JobId, tx: broadcast::Sender<Event>) -> Self {
        Self { job, tx }
    }

    pub(crate) fn job(&self) -> JobId {
        self.job
    }

    pub(crate) fn sender(&self) -> &broadcast::Sender<Event> {
        &self.tx
    }

    pub(crate) fn progress(&self, percent: Option<u8>, bytes_per_sec: f64, phase: Phase) {
        self.tx
            .send(Event::Progress {
                job: self.job,
                percent,
                speed: format_speed(bytes_per_sec),
                phase,
            })
            .ok();
    }

    /// Announce the archive size; unknown (zero) sizes are not announced
    pub(crate) fn total_size(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.tx.send(Event::TotalSize { job: self.job, bytes }).ok();
    }

    pub(crate) fn download_complete(&self) {
        self.tx.send(Event::DownloadComplete { job: self.job }).ok();
    }

    pub(crate) fn extract_complete(&self, folder: Option<String>) {
        self.tx
            .send(Event::ExtractComplete {
                job: self.job,
                folder,
            })
            .ok();
    }

    pub(crate) fn failed(&self, error: &Error) {
        self.tx
            .send(Event::Failed {
                job: self.job,
                error: error.terminal_message(),
                cancelled: error.is_cancelled(),
            })
            .ok();
    }
}
