//! Alarm history recorder.
//!
//! Normalizes inbound alert notifications of either supported shape
//! and appends them to the alarm history table. Parsing is total:
//! malformed entries degrade to defaults or are dropped, they never
//! abort a batch.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::db::{AlarmRecord, AlarmState, Store, StoreError};

/// The three logical fields of an alert notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlarmMessage {
    #[serde(rename = "AlarmName")]
    pub alarm_name: Option<String>,
    #[serde(rename = "NewStateValue")]
    pub new_state_value: Option<String>,
    #[serde(rename = "NewStateReason")]
    pub new_state_reason: Option<String>,
}

impl AlarmMessage {
    /// Normalize a wrapped message payload. A JSON string is decoded
    /// to the message shape; a string that is not JSON is kept as raw
    /// reason text under UNKNOWN; an object is taken as-is.
    fn from_payload(payload: &Value) -> AlarmMessage {
        match payload {
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(msg) => msg,
                Err(_) => AlarmMessage {
                    alarm_name: Some("UNKNOWN".to_string()),
                    new_state_value: Some("UNKNOWN".to_string()),
                    new_state_reason: Some(raw.clone()),
                },
            },
            Value::Object(_) => {
                serde_json::from_value(payload.clone()).unwrap_or_default()
            }
            // Any other payload type has no alarm name to key on.
            _ => AlarmMessage::default(),
        }
    }
}

/// One wrapped notification entry; the envelope carries a message
/// payload that is usually a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeEntry {
    #[serde(rename = "Sns", alias = "SNS")]
    pub sns: Option<EnvelopeBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeBody {
    #[serde(rename = "Message")]
    pub message: Option<Value>,
}

/// An inbound notification: either a batch of wrapped entries or a
/// direct record. The batch shape is matched first since the direct
/// shape accepts any object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    Batch {
        #[serde(rename = "Records")]
        records: Vec<EnvelopeEntry>,
    },
    Direct(AlarmMessage),
}

/// Appends normalized alert events to the alarm history.
#[derive(Clone)]
pub struct AlarmRecorder {
    store: Arc<Store>,
}

impl AlarmRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist one normalized event. Entries with no alarm name are
    /// dropped (there is no meaningful key without one); a missing
    /// state or reason is defaulted rather than dropped. Returns
    /// whether a record was written.
    pub fn record(&self, msg: AlarmMessage) -> Result<bool, StoreError> {
        let alarm_name = match msg.alarm_name.filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => return Ok(false),
        };

        let record = AlarmRecord {
            alarm_name,
            timestamp: Utc::now(),
            state: msg
                .new_state_value
                .map(|s| AlarmState::parse(&s))
                .unwrap_or(AlarmState::Unknown),
            reason: msg.new_state_reason.unwrap_or_default(),
        };
        self.store.add_alarm_record(&record)
    }

    /// Record a state transition raised by the in-process alert engine.
    pub fn record_transition(
        &self,
        alarm_name: &str,
        state: AlarmState,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.store
            .add_alarm_record(&AlarmRecord {
                alarm_name: alarm_name.to_string(),
                timestamp: Utc::now(),
                state,
                reason: reason.to_string(),
            })
            .map(|_| ())
    }

    /// Process an inbound notification of either shape. Entries are
    /// handled independently; one malformed entry never aborts the
    /// rest. Returns the number of records actually persisted.
    pub fn process(&self, notification: Notification) -> usize {
        let messages: Vec<AlarmMessage> = match notification {
            Notification::Direct(msg) => vec![msg],
            Notification::Batch { records } => records
                .iter()
                .filter_map(|entry| entry.sns.as_ref())
                .filter_map(|body| body.message.as_ref())
                .map(AlarmMessage::from_payload)
                .collect(),
        };

        let mut processed = 0;
        for msg in messages {
            match self.record(msg) {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "failed to persist alarm record");
                }
            }
        }
        processed
    }
}
