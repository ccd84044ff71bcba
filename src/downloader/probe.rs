//! Resume-support probe.

use crate::error::{Error, Result};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the server told us before the transfer started
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProbeResult {
    /// Server advertises `Accept-Ranges: bytes`
    pub(crate) accept_ranges: bool,
    /// Content-Length of the HEAD response, if any
    pub(crate) content_length: Option<u64>,
}

/// Issue a HEAD request to learn whether byte ranges are supported
///
/// A failing probe is not fatal: the transfer simply restarts from byte 0 on
/// every attempt. Only cancellation is reported as an error.
pub(crate) async fn probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeResult> {
    let request = client.head(url).timeout(timeout).send();

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        response = request => response,
    };

    let response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            warn!(url, status = r.status().as_u16(), "HEAD probe rejected, resume disabled");
            return Ok(ProbeResult::default());
        }
        Err(e) => {
            warn!(url, error = %e, "HEAD probe failed, resume disabled");
            return Ok(ProbeResult::default());
        }
    };

    let accept_ranges = response
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
        .unwrap_or(false);
    // HEAD bodies are empty, so read the header rather than the body size hint
    let content_length = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|len| *len > 0);

    debug!(url, accept_ranges, ?content_length, "HEAD probe complete");

    Ok(ProbeResult {
        accept_ranges,
        content_length,
    })
}
