//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default seconds between checks of one target.
pub const DEFAULT_CHECK_INTERVAL: u32 = 300;
/// Default probe timeout in seconds.
pub const DEFAULT_TIMEOUT: u32 = 30;
/// Default HTTP status counted as available.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// A monitored website target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Opaque unique identifier, generated at creation, immutable.
    pub id: String,
    /// Absolute URL (`http://` or `https://` with a non-empty host).
    pub url: String,
    /// Display label; defaults to the URL.
    pub name: String,
    pub description: String,
    /// Only enabled targets are probed.
    pub enabled: bool,
    /// Desired seconds between checks. Stored per target; the crawler
    /// cadence itself is a deployment setting.
    pub check_interval: u32,
    /// Probe timeout in seconds, enforced per request.
    pub timeout: u32,
    /// HTTP status counted as available for this target.
    pub expected_status: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a target. `url` is the only required
/// field; everything else falls back to a default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTarget {
    pub url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub check_interval: Option<u32>,
    pub timeout: Option<u32>,
    pub expected_status: Option<u16>,
}

/// Partial update of a target; only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetPatch {
    pub url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub check_interval: Option<u32>,
    pub timeout: Option<u32>,
    pub expected_status: Option<u16>,
}

/// One appended signal value, tagged by target URL and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub time: DateTime<Utc>,
    pub namespace: String,
    pub metric: String,
    pub url: String,
    pub value: f64,
}

/// Alarm lifecycle states, as persisted in alarm history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
    Unknown,
}

impl AlarmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmState::Ok => "OK",
            AlarmState::Alarm => "ALARM",
            AlarmState::InsufficientData => "INSUFFICIENT_DATA",
            AlarmState::Unknown => "UNKNOWN",
        }
    }

    /// Parse a persisted or inbound state string. Anything unrecognized
    /// maps to `Unknown` rather than failing.
    pub fn parse(s: &str) -> AlarmState {
        match s {
            "OK" => AlarmState::Ok,
            "ALARM" => AlarmState::Alarm,
            "INSUFFICIENT_DATA" => AlarmState::InsufficientData,
            _ => AlarmState::Unknown,
        }
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alarm state transition, keyed by `(alarm_name, timestamp)`.
/// Records are append-only history; nothing updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRecord {
    pub alarm_name: String,
    /// Set at persist time, not taken from the notification.
    pub timestamp: DateTime<Utc>,
    pub state: AlarmState,
    pub reason: String,
}
