//! Metrics sink: appends probe signals to the sample store, tagged by
//! target URL, in target-atomic batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{MetricSample, Store, StoreError};
use crate::probe::ProbeSignals;

/// The three per-target signal names, matching the published metric
/// names exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricName {
    Availability,
    Latency,
    ResponseSize,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::Availability,
        MetricName::Latency,
        MetricName::ResponseSize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Availability => "Availability",
            MetricName::Latency => "Latency",
            MetricName::ResponseSize => "ResponseSize",
        }
    }

    pub fn parse(s: &str) -> Option<MetricName> {
        match s {
            "Availability" => Some(MetricName::Availability),
            "Latency" => Some(MetricName::Latency),
            "ResponseSize" => Some(MetricName::ResponseSize),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write side of the sample stream.
#[derive(Clone)]
pub struct MetricsSink {
    store: Arc<Store>,
    namespace: String,
}

impl MetricsSink {
    pub fn new(store: Arc<Store>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Record the 3-sample batch for one probed target. All three
    /// samples share the URL dimension and the cycle timestamp, and
    /// land in a single transaction so a failure leaves no partial
    /// batch for this target.
    pub fn record(
        &self,
        url: &str,
        signals: &ProbeSignals,
        time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sample = |metric: MetricName, value: f64| MetricSample {
            time,
            namespace: self.namespace.clone(),
            metric: metric.as_str().to_string(),
            url: url.to_string(),
            value,
        };

        self.store.add_samples(&[
            sample(MetricName::Availability, f64::from(signals.availability)),
            sample(MetricName::Latency, signals.latency_ms),
            sample(MetricName::ResponseSize, signals.size_bytes as f64),
        ])
    }

    /// Latest value of one metric for one target at or after `since`.
    /// `None` means no datapoint in the window (missing data).
    pub fn latest_value(
        &self,
        url: &str,
        metric: MetricName,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, StoreError> {
        self.store.latest_sample_value(url, metric.as_str(), since)
    }
}
