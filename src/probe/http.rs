//! HTTP probe implementation.

use reqwest::Client;
use std::time::{Duration, Instant};

/// The three numeric signals produced by one probe of one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSignals {
    /// 1 when the response status matched the expected status, else 0.
    pub availability: u8,
    /// Wall-clock milliseconds for the full transfer. 0 when the
    /// request failed before a response could be measured, so a zero is
    /// ambiguous with a 0 ms round trip unless `availability` is also 0.
    pub latency_ms: f64,
    /// Response body length in bytes. 0 on transport failure.
    pub size_bytes: u64,
}

impl ProbeSignals {
    /// Sentinel for probes that failed before measurement was possible.
    pub const FAILED: ProbeSignals = ProbeSignals {
        availability: 0,
        latency_ms: 0.0,
        size_bytes: 0,
    };
}

/// Run an HTTP probe against the given URL.
///
/// A response received within the timeout is measured even when its
/// status is not the expected one; only transport-level failures
/// (timeout, DNS, connection refused, aborted body) collapse to the
/// zero sentinel.
pub async fn run_http_probe(
    client: &Client,
    url: &str,
    timeout: Duration,
    expected_status: u16,
) -> ProbeSignals {
    let start = Instant::now();

    let response = match client.get(url).timeout(timeout).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(url, error = %e, "probe transport failure");
            return ProbeSignals::FAILED;
        }
    };

    let status = response.status().as_u16();

    // Read the full body to measure complete transfer time.
    match response.bytes().await {
        Ok(body) => ProbeSignals {
            availability: u8::from(status == expected_status),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            size_bytes: body.len() as u64,
        },
        Err(e) => {
            tracing::debug!(url, error = %e, "probe body read failure");
            ProbeSignals::FAILED
        }
    }
}
