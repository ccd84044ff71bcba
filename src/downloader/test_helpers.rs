//! Shared helpers for installer and transfer tests.

use crate::config::Config;
use crate::downloader::Installer;
use crate::downloader::sink::EventSink;
use crate::types::{Event, JobId};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Upper bound on how long any test waits for a single event
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config with short delays and no disk-space check, rooted in `root`
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.temp_dir = Some(root.join("tmp"));
    config.download.progress_interval = Duration::from_millis(1);
    config.download.check_disk_space = false;
    config.retry.max_attempts = 3;
    config.retry.retry_delay = Duration::from_millis(10);
    config.retry.stall_timeout = Duration::from_secs(2);
    config
}

/// Installer sharing the test's runtime
pub(crate) fn create_test_installer(root: &Path) -> Installer {
    Installer::with_handle(test_config(root), tokio::runtime::Handle::current()).unwrap()
}

/// Sink for a fixed job id plus a receiver for what it sends
pub(crate) fn test_sink() -> (EventSink, broadcast::Receiver<Event>) {
    let (tx, rx) = broadcast::channel(1000);
    (EventSink::new(JobId(1), tx), rx)
}

/// In-memory ZIP with a single `Game/` root
pub(crate) fn sample_zip() -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = ::zip::ZipWriter::new(&mut buffer);
        let options = ::zip::write::FileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored);
        writer.add_directory("Game/", options).unwrap();
        writer.start_file("Game/WoW.exe", options).unwrap();
        writer.write_all(&[0x4d; 4096]).unwrap();
        writer.start_file("Game/Data/common.mpq", options).unwrap();
        writer.write_all(&[0x2a; 8192]).unwrap();
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// Deterministic non-zip payload of `len` bytes
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Receive events until the terminal event for `job`, failing the test on timeout
pub(crate) async fn collect_until_terminal(
    rx: &mut broadcast::Receiver<Event>,
    job: JobId,
) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for terminal event")
            .expect("event channel closed");
        let done = event.is_terminal() && event.job() == Some(job);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Everything already queued on the receiver
pub(crate) fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Files left in a directory (missing directory counts as empty)
pub(crate) fn dir_entries(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
