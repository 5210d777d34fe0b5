//! Background alert evaluation over the recorded sample stream.
//!
//! Runs on its own interval, decoupled in time from the probe cycle:
//! each pass reads the latest sample per enabled target and rule,
//! feeds the per-alarm state machine, and records state transitions
//! to the alarm history.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::db::{AlarmState, Store};
use crate::metrics::MetricsSink;

use super::recorder::AlarmRecorder;
use super::rules::ThresholdRule;
use super::state::AlarmStateMachine;

/// Evaluates threshold rules against the latest samples on a fixed
/// interval.
pub struct AlertEngine {
    store: Arc<Store>,
    sink: MetricsSink,
    recorder: AlarmRecorder,
    rules: Vec<ThresholdRule>,
    period: Duration,
    /// How far back a sample still counts as a datapoint. Must cover
    /// at least one crawl cadence or every pass between cycles would
    /// resolve as missing data.
    lookback: Duration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<Store>,
        sink: MetricsSink,
        recorder: AlarmRecorder,
        rules: Vec<ThresholdRule>,
        period: Duration,
        lookback: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            recorder,
            rules,
            period,
            lookback,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the evaluation loop in a background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let sink = self.sink.clone();
        let recorder = self.recorder.clone();
        let rules = self.rules.clone();
        let period = self.period;
        let lookback = self.lookback;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut machines: HashMap<String, AlarmStateMachine> = HashMap::new();

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        evaluate_pass(&store, &sink, &recorder, &rules, &mut machines, lookback);
                    }
                }
            }
        });
    }

    /// Stop the evaluation loop.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// One evaluation pass across all enabled targets and rules.
fn evaluate_pass(
    store: &Store,
    sink: &MetricsSink,
    recorder: &AlarmRecorder,
    rules: &[ThresholdRule],
    machines: &mut HashMap<String, AlarmStateMachine>,
    lookback: Duration,
) {
    let targets = match store.list_enabled_targets() {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "AlertEngine: failed to load targets");
            return;
        }
    };

    let since = Utc::now()
        - ChronoDuration::from_std(lookback).unwrap_or_else(|_| ChronoDuration::seconds(60));

    for target in &targets {
        for rule in rules {
            let alarm_name = rule.alarm_name(&target.url);

            let latest = match sink.latest_value(&target.url, rule.metric, since) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(alarm = %alarm_name, error = %e, "sample lookup failed");
                    continue;
                }
            };

            let machine = machines
                .entry(alarm_name.clone())
                .or_insert_with(|| AlarmStateMachine::new(rule.clone()));
            let previous = machine.state();
            let next = machine.observe(latest);

            if next != previous {
                let reason = transition_reason(rule, latest, next);
                tracing::info!(alarm = %alarm_name, state = next.as_str(), %reason, "alarm state change");
                if let Err(e) = recorder.record_transition(&alarm_name, next, &reason) {
                    tracing::error!(alarm = %alarm_name, error = %e, "failed to record alarm transition");
                }
            }
        }
    }
}

fn transition_reason(rule: &ThresholdRule, latest: Option<f64>, state: AlarmState) -> String {
    match latest {
        Some(value) => format!(
            "{} was {:.3} (threshold {} {:.3}): state is now {}",
            rule.metric,
            value,
            rule.comparison.symbol(),
            rule.threshold,
            state
        ),
        None => format!(
            "{}: no datapoints in evaluation period: state is now {}",
            rule.metric, state
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::rules::default_rules;
    use crate::db::{MetricSample, NewTarget};
    use crate::metrics::MetricName;
    use tempfile::NamedTempFile;

    struct Fixture {
        _tmp: NamedTempFile,
        store: Arc<Store>,
        sink: MetricsSink,
        recorder: AlarmRecorder,
    }

    fn fixture() -> Fixture {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let sink = MetricsSink::new(store.clone(), "url-monitor");
        let recorder = AlarmRecorder::new(store.clone());
        Fixture {
            _tmp: tmp,
            store,
            sink,
            recorder,
        }
    }

    fn add_sample(store: &Store, url: &str, metric: MetricName, value: f64) {
        store
            .add_samples(&[MetricSample {
                time: Utc::now(),
                namespace: "url-monitor".to_string(),
                metric: metric.as_str().to_string(),
                url: url.to_string(),
                value,
            }])
            .unwrap();
    }

    #[test]
    fn test_pass_records_alarm_transition() {
        let f = fixture();
        let target = f
            .store
            .create_target(NewTarget {
                url: Some("https://example.com".to_string()),
                ..Default::default()
            })
            .unwrap();

        add_sample(&f.store, &target.url, MetricName::Availability, 0.0);
        add_sample(&f.store, &target.url, MetricName::Latency, 900.0);
        add_sample(&f.store, &target.url, MetricName::ResponseSize, 0.0);

        let mut machines = HashMap::new();
        evaluate_pass(
            &f.store,
            &f.sink,
            &f.recorder,
            &default_rules(),
            &mut machines,
            Duration::from_secs(60),
        );

        let now = Utc::now();
        let start = now - ChronoDuration::minutes(1);
        let end = now + ChronoDuration::minutes(1);
        for metric in MetricName::ALL {
            let alarm_name = format!("{}-{}", metric, target.url);
            let records = f
                .store
                .get_alarm_records(&alarm_name, start, end, 10)
                .unwrap();
            assert_eq!(records.len(), 1, "expected one record for {}", alarm_name);
            assert_eq!(records[0].state, AlarmState::Alarm);
        }
    }

    #[test]
    fn test_missing_data_settles_to_ok() {
        let f = fixture();
        f.store
            .create_target(NewTarget {
                url: Some("https://example.com".to_string()),
                ..Default::default()
            })
            .unwrap();

        let mut machines = HashMap::new();
        evaluate_pass(
            &f.store,
            &f.sink,
            &f.recorder,
            &default_rules(),
            &mut machines,
            Duration::from_secs(60),
        );

        // Missing data is not breaching for the default rules; the
        // machines settle at OK from INSUFFICIENT_DATA.
        let now = Utc::now();
        let start = now - ChronoDuration::minutes(1);
        let end = now + ChronoDuration::minutes(1);
        let records = f
            .store
            .get_alarm_records("Availability-https://example.com", start, end, 10)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, AlarmState::Ok);
    }

    #[test]
    fn test_recovery_recorded_after_alarm() {
        let f = fixture();
        let target = f
            .store
            .create_target(NewTarget {
                url: Some("https://example.com".to_string()),
                ..Default::default()
            })
            .unwrap();

        let rules: Vec<ThresholdRule> = default_rules()
            .into_iter()
            .filter(|r| r.metric == MetricName::Latency)
            .collect();
        let mut machines = HashMap::new();

        add_sample(&f.store, &target.url, MetricName::Latency, 900.0);
        evaluate_pass(
            &f.store,
            &f.sink,
            &f.recorder,
            &rules,
            &mut machines,
            Duration::from_secs(60),
        );
        // Keep the second sample and transition on distinct timestamps.
        std::thread::sleep(Duration::from_millis(2));
        add_sample(&f.store, &target.url, MetricName::Latency, 30.0);
        evaluate_pass(
            &f.store,
            &f.sink,
            &f.recorder,
            &rules,
            &mut machines,
            Duration::from_secs(60),
        );

        let now = Utc::now();
        let records = f
            .store
            .get_alarm_records(
                "Latency-https://example.com",
                now - ChronoDuration::minutes(1),
                now + ChronoDuration::minutes(1),
                10,
            )
            .unwrap();
        // Newest first: the recovery follows the alarm.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, AlarmState::Ok);
        assert_eq!(records[1].state, AlarmState::Alarm);
    }
}
