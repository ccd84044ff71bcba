//! Progress bookkeeping shared by the download and extraction phases.
//!
//! - [`ProgressThrottle`] rate-limits events so a fast stream of chunks does not
//!   flood the consumer's event loop.
//! - [`SpeedSampler`] turns byte counts into an instantaneous rate.
//! - [`StallDetector`] notices when the byte count stops moving.
//! - [`PercentTracker`] keeps reported percentages non-decreasing.

use std::time::{Duration, Instant};

/// Rate-limiter for progress updates.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check if enough time has passed to emit another progress update.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    fn should_emit_at(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

/// Instantaneous throughput: bytes since the previous sample over time since it.
pub struct SpeedSampler {
    last_at: Instant,
    last_bytes: u64,
}

impl SpeedSampler {
    /// Start sampling from `bytes` already processed.
    pub fn new(bytes: u64) -> Self {
        Self {
            last_at: Instant::now(),
            last_bytes: bytes,
        }
    }

    /// Take a sample and return bytes per second since the previous one.
    pub fn sample(&mut self, bytes: u64) -> f64 {
        self.sample_at(Instant::now(), bytes)
    }

    fn sample_at(&mut self, now: Instant, bytes: u64) -> f64 {
        let elapsed = now.duration_since(self.last_at).as_secs_f64();
        let delta = bytes.saturating_sub(self.last_bytes);
        self.last_at = now;
        self.last_bytes = bytes;
        if elapsed <= f64::EPSILON {
            return 0.0;
        }
        delta as f64 / elapsed
    }
}

/// Detects a transfer whose byte count has not moved for `timeout`.
pub struct StallDetector {
    timeout: Duration,
    last_progress_at: Instant,
    last_bytes: u64,
}

impl StallDetector {
    /// Start watching from `bytes` already transferred.
    pub fn new(timeout: Duration, bytes: u64) -> Self {
        Self {
            timeout,
            last_progress_at: Instant::now(),
            last_bytes: bytes,
        }
    }

    /// Record the current byte count; returns true if the transfer is stalled.
    pub fn observe(&mut self, bytes: u64) -> bool {
        self.observe_at(Instant::now(), bytes)
    }

    fn observe_at(&mut self, now: Instant, bytes: u64) -> bool {
        if bytes > self.last_bytes {
            self.last_bytes = bytes;
            self.last_progress_at = now;
            return false;
        }
        now.duration_since(self.last_progress_at) > self.timeout
    }

    /// Time left before the transfer counts as stalled.
    pub fn remaining(&self) -> Duration {
        self.timeout
            .saturating_sub(self.last_progress_at.elapsed())
    }

    /// Configured stall timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Computes percentages that never go backwards within one phase.
#[derive(Default)]
pub struct PercentTracker {
    reported: Option<u8>,
}

impl PercentTracker {
    /// Percent for `done` of `total`, `None` while the total is unknown.
    ///
    /// The result is capped at `cap` and never lower than a value returned before.
    pub fn update(&mut self, done: u64, total: u64, cap: u8) -> Option<u8> {
        if total == 0 {
            return self.reported;
        }
        let raw = ((done.min(total) as u128 * 100) / total as u128) as u8;
        let percent = raw.min(cap).max(self.reported.unwrap_or(0));
        self.reported = Some(percent);
        self.reported
    }

    /// Last percent handed out, if any.
    pub fn reported(&self) -> Option<u8> {
        self.reported
    }

    /// Mark the phase finished.
    pub fn complete(&mut self) -> u8 {
        self.reported = Some(100);
        100
    }
}
