//! Per-alarm breach tracking.

use std::collections::VecDeque;

use crate::db::AlarmState;

use super::rules::ThresholdRule;

/// Tracks recent breach decisions for one (target, rule) pair and
/// derives the alarm state from the configured M-of-N window.
#[derive(Debug)]
pub struct AlarmStateMachine {
    rule: ThresholdRule,
    window: VecDeque<bool>,
    state: AlarmState,
}

impl AlarmStateMachine {
    pub fn new(rule: ThresholdRule) -> Self {
        Self {
            rule,
            window: VecDeque::new(),
            state: AlarmState::InsufficientData,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn rule(&self) -> &ThresholdRule {
        &self.rule
    }

    /// Feed one evaluation period's datapoint (`None` = no data) and
    /// return the resulting state.
    ///
    /// ALARM requires `datapoints_to_alarm` breaching periods within
    /// the last `evaluation_periods`; a single non-breaching period
    /// returns to OK. A breaching period short of the alarm count
    /// leaves the state unchanged, so the machine stays in
    /// INSUFFICIENT_DATA until the first decisive period.
    pub fn observe(&mut self, value: Option<f64>) -> AlarmState {
        let breaching = self.rule.is_breaching(value);
        self.window.push_back(breaching);
        while self.window.len() > self.rule.evaluation_periods.max(1) {
            self.window.pop_front();
        }

        let breach_count = self.window.iter().filter(|b| **b).count();
        if !breaching {
            // One non-breaching evaluation recovers, with no dwell time,
            // even while older breaches remain in the window.
            self.state = AlarmState::Ok;
        } else if breach_count >= self.rule.datapoints_to_alarm.max(1) {
            self.state = AlarmState::Alarm;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::rules::{Comparison, MissingData};
    use crate::metrics::MetricName;

    fn rule(evaluation_periods: usize, datapoints_to_alarm: usize) -> ThresholdRule {
        ThresholdRule {
            metric: MetricName::Latency,
            comparison: Comparison::GreaterThan,
            threshold: 500.0,
            evaluation_periods,
            datapoints_to_alarm,
            missing_data: MissingData::NotBreaching,
        }
    }

    #[test]
    fn test_single_period_alarm_and_recovery() {
        let mut machine = AlarmStateMachine::new(rule(1, 1));
        assert_eq!(machine.state(), AlarmState::InsufficientData);

        assert_eq!(machine.observe(Some(600.0)), AlarmState::Alarm);
        // One non-breaching evaluation is enough to recover.
        assert_eq!(machine.observe(Some(100.0)), AlarmState::Ok);
        assert_eq!(machine.observe(Some(700.0)), AlarmState::Alarm);
    }

    #[test]
    fn test_lone_breach_is_not_decisive() {
        let mut machine = AlarmStateMachine::new(rule(3, 2));
        assert_eq!(machine.observe(Some(600.0)), AlarmState::InsufficientData);
    }

    #[test]
    fn test_m_of_n_window() {
        let mut machine = AlarmStateMachine::new(rule(3, 2));

        assert_eq!(machine.observe(Some(100.0)), AlarmState::Ok);
        // One breach out of [ok, breach] is still short of 2-of-3.
        assert_eq!(machine.observe(Some(600.0)), AlarmState::Ok);
        // Second breach within the 3-period window.
        assert_eq!(machine.observe(Some(600.0)), AlarmState::Alarm);
        // Recovery still takes a single good period, even though two
        // breaches remain in the window.
        assert_eq!(machine.observe(Some(100.0)), AlarmState::Ok);
    }

    #[test]
    fn test_missing_data_follows_rule_policy() {
        let mut lenient = AlarmStateMachine::new(rule(1, 1));
        assert_eq!(lenient.observe(None), AlarmState::Ok);

        let mut strict = AlarmStateMachine::new(ThresholdRule {
            missing_data: MissingData::Breaching,
            ..rule(1, 1)
        });
        assert_eq!(strict.observe(None), AlarmState::Alarm);
    }
}
