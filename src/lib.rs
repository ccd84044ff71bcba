//! # launcher-dl
//!
//! Download-and-install pipeline for a game launcher: fetch a ZIP archive over
//! HTTP(S) with resume and retry, unpack it into a destination directory, and
//! report which top-level folder it produced.
//!
//! ## Design Philosophy
//!
//! - **UI-thread friendly** - [`Installer::start`] returns immediately; the work
//!   runs on a bounded worker pool
//! - **Event-driven** - consumers subscribe to [`Event`]s, no polling of job state
//! - **One job at a time** - a second start while busy is rejected, not queued
//! - **Cooperative cancellation** - every job ends with exactly one terminal event
//!
//! ## Quick Start
//!
//! ```no_run
//! use launcher_dl::{Config, Event, Installer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let installer = Installer::new(Config::default())?;
//!     let mut events = installer.subscribe();
//!
//!     installer.start("https://cdn.example.com/client.zip", "/games")?;
//!
//!     while let Ok(event) = events.blocking_recv() {
//!         match &event {
//!             Event::Progress { percent, speed, phase, .. } => {
//!                 println!("{phase}: {percent:?}% at {speed}");
//!             }
//!             Event::ExtractComplete { folder, .. } => println!("installed: {folder:?}"),
//!             Event::Failed { error, .. } => eprintln!("failed: {error}"),
//!             _ => {}
//!         }
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Job controller and download worker
pub mod downloader;
/// Error types
pub mod error;
/// ZIP extraction and root folder detection
pub mod extraction;
/// Progress throttling, speed sampling and stall detection
pub mod progress;
/// Retry classification and attempt budget
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ExtractionConfig, PoolConfig, RetryConfig};
pub use downloader::Installer;
pub use error::{Error, Result};
pub use extraction::ExtractionSummary;
pub use types::{Event, JobId, Phase, Severity};
