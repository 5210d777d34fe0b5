//! Threshold rules: static configuration mapping a signal value to a
//! breach decision.

use serde::{Deserialize, Serialize};

use crate::metrics::MetricName;

/// Default availability ratio below which a target alarms.
pub const AVAIL_THRESHOLD: f64 = 0.99;
/// Default latency ceiling in milliseconds.
pub const LATENCY_THRESHOLD_MS: f64 = 500.0;
/// Minimum response size in bytes; below this means no bytes arrived.
pub const RESPONSE_SIZE_MIN_BYTES: f64 = 1.0;

/// Strict comparison operator. There is deliberately no `<=`/`>=`:
/// a value equal to the threshold never breaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    LessThan,
    GreaterThan,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::LessThan => "<",
            Comparison::GreaterThan => ">",
        }
    }
}

/// How an evaluation period with no datapoint is treated. Per rule,
/// not global: probe-signal rules stay OK through deployment gaps,
/// while a heartbeat-style rule treats silence itself as the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingData {
    NotBreaching,
    Breaching,
}

/// One threshold rule for one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric: MetricName,
    pub comparison: Comparison,
    pub threshold: f64,
    /// Window size: number of consecutive periods considered.
    pub evaluation_periods: usize,
    /// Breaching periods within the window required to alarm.
    pub datapoints_to_alarm: usize,
    pub missing_data: MissingData,
}

impl ThresholdRule {
    /// Decide breach/no-breach for one period's datapoint. `None`
    /// (no datapoint) resolves by the rule's missing-data policy.
    pub fn is_breaching(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) => match self.comparison {
                Comparison::LessThan => v < self.threshold,
                Comparison::GreaterThan => v > self.threshold,
            },
            None => matches!(self.missing_data, MissingData::Breaching),
        }
    }

    /// Alarm name for this rule applied to one target URL.
    pub fn alarm_name(&self, url: &str) -> String {
        format!("{}-{}", self.metric, url)
    }
}

/// Default rules, one per probe metric: availability below 99%,
/// latency above 500 ms, response size below 1 byte. Each alarms on a
/// single breaching period and ignores missing data.
pub fn default_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            metric: MetricName::Availability,
            comparison: Comparison::LessThan,
            threshold: AVAIL_THRESHOLD,
            evaluation_periods: 1,
            datapoints_to_alarm: 1,
            missing_data: MissingData::NotBreaching,
        },
        ThresholdRule {
            metric: MetricName::Latency,
            comparison: Comparison::GreaterThan,
            threshold: LATENCY_THRESHOLD_MS,
            evaluation_periods: 1,
            datapoints_to_alarm: 1,
            missing_data: MissingData::NotBreaching,
        },
        ThresholdRule {
            metric: MetricName::ResponseSize,
            comparison: Comparison::LessThan,
            threshold: RESPONSE_SIZE_MIN_BYTES,
            evaluation_periods: 1,
            datapoints_to_alarm: 1,
            missing_data: MissingData::NotBreaching,
        },
    ]
}

/// Heartbeat-style rule: the absence of any datapoint for the metric
/// is itself the failure signal, so missing data breaches.
pub fn heartbeat_rule(metric: MetricName, threshold: f64) -> ThresholdRule {
    ThresholdRule {
        metric,
        comparison: Comparison::LessThan,
        threshold,
        evaluation_periods: 1,
        datapoints_to_alarm: 1,
        missing_data: MissingData::Breaching,
    }
}
