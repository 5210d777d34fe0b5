//! Probe module for website monitoring.
//!
//! A probe is one bounded-time HTTP check of one target. Probes are
//! total: they always yield the three numeric signals and never error
//! past their own boundary.

mod http;

pub use http::*;

use reqwest::Client;
use std::time::Duration;

use crate::db::Target;

/// Probe one target with its own timeout and expected status.
pub async fn probe_target(client: &Client, target: &Target) -> ProbeSignals {
    let timeout = Duration::from_secs(u64::from(target.timeout.max(1)));
    run_http_probe(client, &target.url, timeout, target.expected_status).await
}
