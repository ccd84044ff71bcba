//! Formatting, header parsing and filesystem helpers

use std::path::Path;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Scale a byte quantity by powers of 1024, stopping at GB
fn scale(bytes: f64) -> (f64, &'static str) {
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    (value, UNITS[unit])
}

/// Format a transfer rate in binary units with two decimals
///
/// # Examples
///
/// ```
/// use launcher_dl::utils::format_speed;
///
/// assert_eq!(format_speed(500.0), "500.00 B/s");
/// assert_eq!(format_speed(2048.0), "2.00 KB/s");
/// ```
pub fn format_speed(bytes_per_sec: f64) -> String {
    let (value, unit) = scale(bytes_per_sec);
    format!("{:.2} {}/s", value, unit)
}

/// Format a byte count in binary units with two decimals
///
/// # Examples
///
/// ```
/// use launcher_dl::utils::format_size;
///
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let (value, unit) = scale(bytes as f64);
    format!("{:.2} {}", value, unit)
}

/// Total length from a `Content-Range` header value such as `bytes 100-199/1000`
///
/// Returns `None` for an unknown total (`*`) or a malformed value.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes")
        .map(str::trim_start)
        .unwrap_or(value);
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// First byte position from a `Content-Range` header value such as `bytes 100-199/1000`
///
/// Returns `None` for an unsatisfied range (`bytes */1000`) or a malformed value.
pub fn parse_content_range_start(value: &str) -> Option<u64> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes")
        .map(str::trim_start)
        .unwrap_or(value);
    let (range, _) = rest.split_once('/')?;
    let (start, _) = range.split_once('-')?;
    start.trim().parse::<u64>().ok()
}

/// Verify a directory can be listed and written to
///
/// Creates and removes a small probe file. Runs before a job starts so that a
/// bad destination fails immediately instead of after a long download.
pub fn check_directory_writable(dir: &Path) -> std::io::Result<()> {
    tracing::debug!(?dir, "checking directory permissions");

    std::fs::read_dir(dir)?;

    let probe = dir.join(".launcher-dl-write-test.tmp");
    std::fs::write(&probe, b"test")?;
    std::fs::remove_file(&probe)?;

    tracing::debug!(?dir, "directory permission checks passed");
    Ok(())
}

/// Get available disk space for the filesystem containing `path`
///
/// Uses statvfs on unix and GetDiskFreeSpaceExW on Windows.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialized
        // and only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail: blocks available to unprivileged users
            #[allow(clippy::unnecessary_cast)]
            Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and the out pointers reference
        // live, aligned u64 locals.
        unsafe {
            let mut available: u64 = 0;
            let mut total: u64 = 0;
            let mut free: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut available as *mut u64 as *mut _,
                &mut total as *mut u64 as *mut _,
                &mut free as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "disk space checking is not supported on this platform",
        ))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn format_speed_uses_binary_steps() {
        assert_eq!(format_speed(500.0), "500.00 B/s");
        assert_eq!(format_speed(2048.0), "2.00 KB/s");
        assert_eq!(format_speed(5.0 * 1024.0 * 1024.0), "5.00 MB/s");
        assert_eq!(format_speed(3.0 * 1024.0 * 1024.0 * 1024.0), "3.00 GB/s");
    }

    #[test]
    fn format_speed_boundaries() {
        assert_eq!(format_speed(0.0), "0.00 B/s");
        assert_eq!(format_speed(1023.0), "1023.00 B/s");
        assert_eq!(format_speed(1024.0), "1.00 KB/s");
        // Stays in GB beyond the last unit
        assert_eq!(format_speed(2048.0 * 1024.0 * 1024.0 * 1024.0), "2048.00 GB/s");
    }

    #[test]
    fn format_size_matches_speed_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range_total("bytes 100-199/1000"), Some(1000));
        assert_eq!(parse_content_range_total("bytes */1000"), Some(1000));
        assert_eq!(parse_content_range_total(" bytes 0-0/1 "), Some(1));
    }

    #[test]
    fn content_range_start_is_parsed() {
        assert_eq!(parse_content_range_start("bytes 400-999/1000"), Some(400));
        assert_eq!(parse_content_range_start("bytes 0-0/*"), Some(0));
        assert_eq!(parse_content_range_start("bytes */1000"), None);
        assert_eq!(parse_content_range_start("bytes 400/1000"), None);
    }

    #[test]
    fn content_range_unknown_or_malformed_total() {
        assert_eq!(parse_content_range_total("bytes 0-99/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
        assert_eq!(parse_content_range_total(""), None);
    }

    #[test]
    fn writable_directory_passes_and_leaves_no_probe() {
        let dir = TempDir::new().unwrap();
        check_directory_writable(dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_not_writable() {
        let dir = TempDir::new().unwrap();
        assert!(check_directory_writable(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn available_space_for_temp_dir() {
        let dir = TempDir::new().unwrap();
        let available = get_available_space(dir.path()).unwrap();
        assert!(available > 0, "temp dir should have free space");
    }

    #[test]
    fn available_space_for_missing_path_fails() {
        assert!(get_available_space(Path::new("/nonexistent/path/that/should/not/exist")).is_err());
    }
}
