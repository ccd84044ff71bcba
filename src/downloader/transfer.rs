//! Resumable HTTP transfer of one URL into one local file.
//!
//! Each attempt either resumes from the bytes already on disk (when the server
//! supports ranges) or restarts from zero. Transient failures, including a
//! stalled connection, are retried with a fixed delay; an attempt that moved the
//! file forward resets the retry budget.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::{PercentTracker, ProgressThrottle, SpeedSampler, StallDetector};
use crate::retry::{IsRetryable, RetryBudget, RetryDecision, wait_or_cancel};
use crate::types::Phase;
use crate::utils::{get_available_space, parse_content_range_start, parse_content_range_total};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::{self, ProbeResult};
use super::sink::EventSink;

/// Download-phase state for one job
pub(crate) struct Transfer<'a> {
    client: &'a reqwest::Client,
    url: &'a str,
    path: &'a Path,
    config: &'a Config,
    cancel: &'a CancellationToken,
    sink: &'a EventSink,
    /// Total size in bytes, 0 while unknown
    total: u64,
    /// Bytes currently in the file
    downloaded: u64,
    throttle: ProgressThrottle,
    sampler: SpeedSampler,
    percent: PercentTracker,
}

impl<'a> Transfer<'a> {
    pub(crate) fn new(
        client: &'a reqwest::Client,
        url: &'a str,
        path: &'a Path,
        config: &'a Config,
        cancel: &'a CancellationToken,
        sink: &'a EventSink,
    ) -> Self {
        Self {
            client,
            url,
            path,
            config,
            cancel,
            sink,
            total: 0,
            downloaded: 0,
            throttle: ProgressThrottle::new(config.download.progress_interval),
            sampler: SpeedSampler::new(0),
            percent: PercentTracker::default(),
        }
    }

    /// Run the download phase to completion
    ///
    /// Returns the number of bytes in the file.
    pub(crate) async fn run(mut self) -> Result<u64> {
        let job = self.sink.job().0;
        let probe = probe::probe(
            self.client,
            self.url,
            self.config.retry.stall_timeout,
            self.cancel,
        )
        .await?;

        let mut budget = RetryBudget::new(&self.config.retry);

        loop {
            let before = self.downloaded;
            let error = match self.attempt(&probe).await {
                Ok(()) => break,
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if probe.accept_ranges && self.downloaded > before {
                debug!(job, downloaded = self.downloaded, "attempt made progress, retry budget reset");
                budget.reset();
            }

            match budget.record_failure() {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        job,
                        error = %error,
                        attempt = budget.attempts(),
                        max_attempts = self.config.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "download attempt failed, retrying"
                    );
                    wait_or_cancel(delay, self.cancel).await?;
                }
                RetryDecision::Exhausted { attempts } => {
                    error!(job, error = %error, attempts, "download failed after all retry attempts");
                    return Err(Error::RetriesExhausted {
                        attempts,
                        last_error: error.to_string(),
                    });
                }
            }
        }

        // The last throttled emit may already have reported completion
        if self.percent.reported() != Some(100) {
            let percent = (self.total > 0).then(|| self.percent.complete());
            self.sink.progress(
                percent,
                self.sampler.sample(self.downloaded),
                Phase::Downloading,
            );
        }

        info!(job, bytes = self.downloaded, "download phase complete");
        Ok(self.downloaded)
    }

    /// One request/stream cycle
    async fn attempt(&mut self, probe: &ProbeResult) -> Result<()> {
        let job = self.sink.job().0;
        let existing = if probe.accept_ranges {
            file_len(self.path).await?
        } else {
            0
        };

        if self.total > 0 && existing >= self.total {
            debug!(job, existing, total = self.total, "file already complete");
            self.downloaded = existing;
            return Ok(());
        }

        let mut request = self.client.get(self.url);
        if existing > 0 {
            request = request.header(RANGE, format!("bytes={}-", existing));
        }
        debug!(job, offset = existing, "requesting archive");

        let mut stall = StallDetector::new(self.config.retry.stall_timeout, existing);
        let mut response = self.guarded(&stall, request.send()).await?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
            info!(job, existing, "server reports range not satisfiable, file already complete");
            self.downloaded = existing;
            if self.total == 0 {
                if let Some(total) = content_range_total(&response) {
                    self.learn_total(total, existing)?;
                }
            }
            return Ok(());
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
            });
        }

        let resumed = status == StatusCode::PARTIAL_CONTENT && existing > 0;
        if existing > 0 && !resumed {
            warn!(job, existing, "server ignored range request, restarting from zero");
        }
        if resumed {
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.check_resume_offset(content_range, existing).await?;
        }
        let offset = if resumed { existing } else { 0 };

        if self.total == 0 {
            let learned = if status == StatusCode::PARTIAL_CONTENT {
                content_range_total(&response)
            } else {
                response.content_length()
            };
            if let Some(total) = learned.or(probe.content_length).filter(|t| *t > 0) {
                self.learn_total(total, offset)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resumed)
            .truncate(!resumed)
            .open(self.path)
            .await?;
        let mut writer = BufWriter::with_capacity(self.config.download.chunk_size, file);

        self.downloaded = offset;
        self.sampler = SpeedSampler::new(offset);
        stall = StallDetector::new(self.config.retry.stall_timeout, offset);

        let streamed = self.stream_body(&mut response, &mut writer, &mut stall).await;
        // Keep whatever arrived so the next attempt can resume from it
        let flushed = writer.flush().await;
        streamed?;
        flushed?;
        Ok(())
    }

    async fn stream_body<W>(
        &mut self,
        response: &mut reqwest::Response,
        writer: &mut W,
        stall: &mut StallDetector,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let Some(mut chunk) = self.guarded(stall, response.chunk()).await? else {
                break;
            };

            if self.total > 0 && self.downloaded + chunk.len() as u64 > self.total {
                let keep = self.total.saturating_sub(self.downloaded) as usize;
                warn!(
                    job = self.sink.job().0,
                    extra = chunk.len() - keep,
                    "server sent more than the announced size, discarding excess"
                );
                chunk.truncate(keep);
            }

            writer.write_all(&chunk).await?;
            self.downloaded += chunk.len() as u64;

            if stall.observe(self.downloaded) {
                return Err(Error::Stalled {
                    after: stall.timeout(),
                });
            }

            if self.throttle.should_emit() {
                let percent = self.percent.update(self.downloaded, self.total, 100);
                self.sink.progress(
                    percent,
                    self.sampler.sample(self.downloaded),
                    Phase::Downloading,
                );
            }

            if self.total > 0 && self.downloaded >= self.total {
                return Ok(());
            }
        }

        if self.total > 0 && self.downloaded < self.total {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "connection closed after {} of {} bytes",
                    self.downloaded, self.total
                ),
            )));
        }
        Ok(())
    }

    /// Make sure a 206 continues the partial file at `existing`
    ///
    /// On a mismatch the partial file is discarded so the retry downloads from zero.
    async fn check_resume_offset(
        &mut self,
        content_range: Option<String>,
        existing: u64,
    ) -> Result<()> {
        let start = content_range.as_deref().and_then(parse_content_range_start);
        let total = content_range.as_deref().and_then(parse_content_range_total);

        if start == Some(existing) && total.is_none_or(|t| t > existing) {
            return Ok(());
        }

        warn!(
            job = self.sink.job().0,
            existing,
            ?content_range,
            "partial response does not continue the local file, discarding it"
        );
        tokio::fs::File::create(self.path).await?;
        self.downloaded = 0;
        Err(Error::RangeMismatch {
            expected: existing,
            actual: start,
        })
    }

    /// Await a network future, bounded by the stall window and cancellation
    async fn guarded<T>(
        &self,
        stall: &StallDetector,
        fut: impl Future<Output = reqwest::Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(stall.remaining(), fut) => match result {
                Ok(r) => r.map_err(Error::from),
                Err(_) => Err(Error::Stalled { after: stall.timeout() }),
            },
        }
    }

    /// Record the total size, announce it and make sure it fits on disk
    fn learn_total(&mut self, total: u64, offset: u64) -> Result<()> {
        self.total = total;
        self.sink.total_size(total);
        debug!(job = self.sink.job().0, total, "total size learned");

        if !self.config.download.check_disk_space {
            return Ok(());
        }
        let required = total.saturating_sub(offset);
        let dir = self.path.parent().unwrap_or(self.path);
        match get_available_space(dir) {
            Ok(available) if available < required => {
                Err(Error::InsufficientSpace {
                    required,
                    available,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(?dir, error = %e, "could not check free disk space");
                Ok(())
            }
        }
    }
}

fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_total)
}

async fn file_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}
