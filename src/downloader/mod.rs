//! Download-and-install controller split into focused submodules.
//!
//! - [`Installer`] (this file) - the facade a launcher UI holds: start, cancel, subscribe
//! - [`worker`] - one job: temp file lifecycle, download phase, extraction phase
//! - [`transfer`] - resumable HTTP transfer with retry and stall detection
//! - [`probe`] - HEAD probe for byte-range support
//! - [`sink`] - event emission bound to a job id

mod probe;
mod sink;
mod transfer;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Event, JobId};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sink::EventSink;
use worker::Worker;

/// The job currently holding the installer
#[derive(Debug)]
pub(crate) struct ActiveJob {
    pub(crate) id: JobId,
    pub(crate) cancel: CancellationToken,
}

/// Shared "is a job active" state, the only state touched by both the
/// caller's thread and worker threads
#[derive(Clone, Default)]
pub(crate) struct ActiveSlot(Arc<Mutex<Option<ActiveJob>>>);

impl ActiveSlot {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        // The slot holds plain data; a panic while holding it cannot leave it half-updated
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the slot if it still belongs to `job`, announcing the change
    ///
    /// Returns false when the job was already cancelled or replaced.
    pub(crate) fn release(&self, job: JobId, event_tx: &broadcast::Sender<Event>) -> bool {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(active) if active.id == job => {
                *slot = None;
                event_tx.send(Event::ActiveChanged { active: false }).ok();
                true
            }
            _ => false,
        }
    }
}

/// Where workers run
enum Executor {
    /// Runtime created and owned by the installer
    Owned(Option<Runtime>),
    /// Runtime provided by the embedding application
    Shared(Handle),
}

impl Executor {
    fn handle(&self) -> Option<Handle> {
        match self {
            Executor::Owned(runtime) => runtime.as_ref().map(|rt| rt.handle().clone()),
            Executor::Shared(handle) => Some(handle.clone()),
        }
    }
}

/// Download-and-extract controller
///
/// Lives on the caller's (UI) thread. Each accepted job runs as a worker on a
/// bounded pool; all results come back as [`Event`]s through
/// [`subscribe`](Installer::subscribe). At most one job is active at a time.
///
/// # Example
///
/// ```no_run
/// use launcher_dl::{Config, Event, Installer};
///
/// # fn main() -> launcher_dl::Result<()> {
/// let installer = Installer::new(Config::default())?;
/// let mut events = installer.subscribe();
///
/// installer.start("https://cdn.example.com/client.zip", "/games")?;
///
/// while let Ok(event) = events.blocking_recv() {
///     if let Event::ExtractComplete { folder, .. } = &event {
///         println!("installed into {:?}", folder);
///     }
///     if event.is_terminal() {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Installer {
    config: Arc<Config>,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
    executor: Executor,
    active: ActiveSlot,
    next_job: AtomicU64,
}

impl Installer {
    /// Create an installer that owns its worker pool
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.pool.worker_threads)
            .max_blocking_threads(config.pool.max_blocking_threads)
            .thread_name("launcher-dl-worker")
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to start worker pool: {}", e),
                ))
            })?;

        Self::build(config, Executor::Owned(Some(runtime)))
    }

    /// Create an installer that submits workers to an existing runtime
    pub fn with_handle(config: Config, handle: Handle) -> Result<Self> {
        config.validate()?;
        Self::build(config, Executor::Shared(handle))
    }

    fn build(config: Config, executor: Executor) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.download.user_agent.clone())
            .connect_timeout(config.download.connect_timeout)
            .build()?;

        let (event_tx, _rx) = broadcast::channel(config.pool.event_buffer);

        Ok(Self {
            config: Arc::new(config),
            client,
            event_tx,
            executor,
            active: ActiveSlot::default(),
            next_job: AtomicU64::new(0),
        })
    }

    /// Subscribe to events
    ///
    /// The receiver can be drained from any thread; a UI loop would typically
    /// call `try_recv()` on every frame.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a job is currently active
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Id of the active job, if any
    pub fn active_job(&self) -> Option<JobId> {
        self.active.lock().as_ref().map(|job| job.id)
    }

    /// Download `url` and extract it into `destination`
    ///
    /// Returns as soon as the job is submitted. Fails with
    /// [`Error::AlreadyActive`] while another job is running.
    pub fn start(&self, url: &str, destination: impl AsRef<Path>) -> Result<JobId> {
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let handle = self.executor.handle().ok_or_else(|| {
            Error::Other("worker pool has been shut down".to_string())
        })?;

        let mut slot = self.active.lock();
        if let Some(active) = slot.as_ref() {
            return Err(Error::AlreadyActive { job: active.id });
        }

        let id = JobId(self.next_job.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();
        *slot = Some(ActiveJob {
            id,
            cancel: cancel.clone(),
        });
        self.event_tx.send(Event::ActiveChanged { active: true }).ok();

        let worker = Worker {
            sink: EventSink::new(id, self.event_tx.clone()),
            url: url.to_string(),
            destination: destination.as_ref().to_path_buf(),
            config: Arc::clone(&self.config),
            client: self.client.clone(),
            cancel,
            active: self.active.clone(),
        };
        handle.spawn(worker.run());

        info!(
            job = id.0,
            url,
            destination = ?destination.as_ref(),
            "job submitted"
        );
        Ok(id)
    }

    /// Request cooperative cancellation of the active job
    ///
    /// The installer is idle as soon as this returns, even though the worker may
    /// need a moment to unwind and remove its temp file. Returns false if no job
    /// was active.
    pub fn cancel(&self) -> bool {
        let mut slot = self.active.lock();
        let Some(job) = slot.take() else {
            debug!("cancel requested with no active job");
            return false;
        };

        job.cancel.cancel();
        self.event_tx.send(Event::ActiveChanged { active: false }).ok();
        info!(job = job.id.0, "job cancellation requested");
        true
    }
}

impl Drop for Installer {
    fn drop(&mut self) {
        if let Some(job) = self.active.lock().take() {
            job.cancel.cancel();
        }
        if let Executor::Owned(runtime) = &mut self.executor {
            if let Some(runtime) = runtime.take() {
                runtime.shutdown_background();
            }
        }
    }
}
