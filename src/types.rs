//! Core types for launcher-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a download+extract job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage of a job that a progress event refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Archive is being fetched over HTTP
    Downloading,
    /// Archive entries are being written to the destination
    Extracting,
}

impl Phase {
    /// Wire name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Downloading => "downloading",
            Phase::Extracting => "extracting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a consumer should present an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine status change
    Info,
    /// Job finished successfully
    Success,
    /// Finished, but the caller should double check the result
    Warning,
    /// Job failed
    Error,
}

/// Notification emitted by the installer
///
/// Events are delivered through a broadcast channel (see
/// [`Installer::subscribe`](crate::Installer::subscribe)). For any one job,
/// progress is non-decreasing within a phase, `DownloadComplete` precedes every
/// extraction progress event, and the terminal event (`ExtractComplete` or
/// `Failed`) is the last event carrying that job id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress update, rate limited
    Progress {
        /// Job id
        job: JobId,
        /// Percent complete (0-100), `None` while the total is unknown
        percent: Option<u8>,
        /// Human-formatted throughput, e.g. "2.00 MB/s"
        speed: String,
        /// Phase the progress refers to
        phase: Phase,
    },

    /// Total archive size learned from the server
    TotalSize {
        /// Job id
        job: JobId,
        /// Size in bytes (always positive)
        bytes: u64,
    },

    /// Download phase finished, extraction is about to start
    DownloadComplete {
        /// Job id
        job: JobId,
    },

    /// Archive fully extracted
    ExtractComplete {
        /// Job id
        job: JobId,
        /// Top-level folder of the archive, `None` if it could not be determined
        folder: Option<String>,
    },

    /// Job ended without completing
    Failed {
        /// Job id
        job: JobId,
        /// Error message ("cancelled" for user-initiated stops)
        error: String,
        /// Whether the job was stopped by the caller
        cancelled: bool,
    },

    /// Installer switched between idle and busy
    ActiveChanged {
        /// Whether a job is now active
        active: bool,
    },
}

impl Event {
    /// Job this event belongs to, if any
    pub fn job(&self) -> Option<JobId> {
        match self {
            Event::Progress { job, .. }
            | Event::TotalSize { job, .. }
            | Event::DownloadComplete { job }
            | Event::ExtractComplete { job, .. }
            | Event::Failed { job, .. } => Some(*job),
            Event::ActiveChanged { .. } => None,
        }
    }

    /// Whether this is the last event a job will emit
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::ExtractComplete { .. } | Event::Failed { .. })
    }

    /// Presentation severity of the event
    pub fn severity(&self) -> Severity {
        match self {
            Event::ExtractComplete { folder: Some(_), .. } => Severity::Success,
            Event::ExtractComplete { folder: None, .. } => Severity::Warning,
            Event::Failed {
                cancelled: true, ..
            } => Severity::Info,
            Event::Failed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// Percent rendered for display: the number, or empty when indeterminate
    pub fn percent_label(&self) -> Option<String> {
        match self {
            Event::Progress { percent, .. } => {
                Some(percent.map(|p| p.to_string()).unwrap_or_default())
            }
            _ => None,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_match_wire_format() {
        assert_eq!(Phase::Downloading.to_string(), "downloading");
        assert_eq!(Phase::Extracting.to_string(), "extracting");
        assert_eq!(
            serde_json::to_string(&Phase::Extracting).unwrap(),
            "\"extracting\""
        );
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Progress {
            job: JobId(3),
            percent: Some(40),
            speed: "1.00 KB/s".into(),
            phase: Phase::Downloading,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["job"], 3);
        assert_eq!(json["phase"], "downloading");
    }

    #[test]
    fn only_extract_complete_and_failed_are_terminal() {
        let job = JobId(1);
        assert!(Event::ExtractComplete { job, folder: None }.is_terminal());
        assert!(
            Event::Failed {
                job,
                error: "x".into(),
                cancelled: false
            }
            .is_terminal()
        );
        assert!(!Event::DownloadComplete { job }.is_terminal());
        assert!(!Event::ActiveChanged { active: false }.is_terminal());
        assert_eq!(Event::ActiveChanged { active: true }.job(), None);
    }

    #[test]
    fn severity_separates_cancellation_from_failure() {
        let job = JobId(1);
        let cancelled = Event::Failed {
            job,
            error: "cancelled".into(),
            cancelled: true,
        };
        let failed = Event::Failed {
            job,
            error: "boom".into(),
            cancelled: false,
        };
        assert_eq!(cancelled.severity(), Severity::Info);
        assert_eq!(failed.severity(), Severity::Error);
        assert_eq!(
            Event::ExtractComplete { job, folder: None }.severity(),
            Severity::Warning
        );
        assert_eq!(
            Event::ExtractComplete {
                job,
                folder: Some("Game".into())
            }
            .severity(),
            Severity::Success
        );
    }

    #[test]
    fn percent_label_is_empty_when_indeterminate() {
        let event = Event::Progress {
            job: JobId(1),
            percent: None,
            speed: "0.00 B/s".into(),
            phase: Phase::Downloading,
        };
        assert_eq!(event.percent_label().as_deref(), Some(""));
        assert_eq!(Event::DownloadComplete { job: JobId(1) }.percent_label(), None);
    }
}
