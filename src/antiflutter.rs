use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::policy::AggregationResult;
use crate::sentiment::normalize_topic;
use crate::window::Ratio;

/// Upper bound for the per-topic alert interval: 30 days.
pub const MAX_ALERT_INTERVAL_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Armed,
    Cooldown,
}

/// Per-topic alert bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertState {
    pub topic: String,
    pub state: GateState,
    pub last_alert_ratio: Option<f64>,
    pub last_alert_time: Option<DateTime<Utc>>,
}

impl AlertState {
    fn new(topic: String) -> Self {
        Self {
            topic,
            state: GateState::Armed,
            last_alert_ratio: None,
            last_alert_time: None,
        }
    }

    pub fn armed(&self) -> bool {
        self.state == GateState::Armed
    }
}

/// Emitted once per excursion above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub topic: String,
    pub ratio: f64,
    pub positive_count: usize,
    pub sample_size: usize,
    pub at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn message(&self) -> String {
        format!(
            "Positive sentiment alert for {}! {}/{} recent posts ({:.1}%) are positive.",
            self.topic,
            self.positive_count,
            self.sample_size,
            self.ratio * 100.0
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// Armed -> Cooldown; the caller must dispatch the event.
    Fire(AlertEvent),
    /// Above threshold while in Cooldown.
    Suppressed,
    /// Above threshold and armed, but inside `min_interval` of the last alert.
    RateLimited,
    /// Cooldown -> Armed.
    Rearmed,
    /// Nothing changed.
    Idle,
}

/// Ratio-hysteresis gate: a topic alerts when armed and the verdict says so,
/// then stays quiet until its ratio has dropped back below the threshold.
#[derive(Debug, Clone)]
pub struct AlertGate {
    threshold: f64,
    min_interval: Duration,
    states: HashMap<String, AlertState>,
}

impl AlertGate {
    /// `min_interval_secs` <= 0 disables the time-based limit; values above
    /// [`MAX_ALERT_INTERVAL_SECS`] are clamped to it.
    pub fn new(threshold: f64, min_interval_secs: i64) -> Self {
        Self {
            threshold,
            min_interval: Duration::seconds(min_interval_secs.clamp(0, MAX_ALERT_INTERVAL_SECS)),
            states: HashMap::new(),
        }
    }

    pub fn observe(
        &mut self,
        topic: &str,
        result: &AggregationResult,
        now: DateTime<Utc>,
    ) -> GateVerdict {
        let key = normalize_topic(topic);
        let below =
            !Ratio::new(result.positive_count, result.sample_size).at_least(self.threshold);
        let min_interval = self.min_interval;
        let st = self
            .states
            .entry(key.clone())
            .or_insert_with(|| AlertState::new(key.clone()));

        match st.state {
            GateState::Cooldown if below => {
                st.state = GateState::Armed;
                GateVerdict::Rearmed
            }
            GateState::Cooldown if result.should_consider_alert => GateVerdict::Suppressed,
            GateState::Cooldown => GateVerdict::Idle,
            GateState::Armed if !result.should_consider_alert => GateVerdict::Idle,
            GateState::Armed => {
                if let Some(last) = st.last_alert_time {
                    if now.signed_duration_since(last) < min_interval {
                        return GateVerdict::RateLimited;
                    }
                }
                st.state = GateState::Cooldown;
                st.last_alert_ratio = Some(result.ratio);
                st.last_alert_time = Some(now);
                GateVerdict::Fire(AlertEvent {
                    topic: key,
                    ratio: result.ratio,
                    positive_count: result.positive_count,
                    sample_size: result.sample_size,
                    at: now,
                })
            }
        }
    }

    /// Enter Cooldown silently when a warm-started window already warrants an
    /// alert. Returns true if the topic was put in Cooldown.
    pub fn prime(&mut self, topic: &str, result: &AggregationResult) -> bool {
        if !result.should_consider_alert {
            return false;
        }
        let key = normalize_topic(topic);
        let st = self
            .states
            .entry(key.clone())
            .or_insert_with(|| AlertState::new(key));
        st.state = GateState::Cooldown;
        st.last_alert_ratio = Some(result.ratio);
        true
    }

    pub fn state_for(&self, topic: &str) -> Option<&AlertState> {
        self.states.get(&normalize_topic(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn verdict(positive: usize, total: usize, alert: bool) -> AggregationResult {
        AggregationResult {
            ratio: positive as f64 / total as f64,
            positive_count: positive,
            sample_size: total,
            should_consider_alert: alert,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 15, 22, 0, 0).unwrap()
    }

    #[test]
    fn sustained_excursion_fires_once() {
        let mut gate = AlertGate::new(0.7, 0);
        let hot = verdict(8, 10, true);
        assert!(matches!(gate.observe("BTC", &hot, t0()), GateVerdict::Fire(_)));
        assert_eq!(gate.observe("BTC", &hot, t0()), GateVerdict::Suppressed);
        assert_eq!(gate.observe("BTC", &hot, t0()), GateVerdict::Suppressed);
        assert!(!gate.state_for("btc").unwrap().armed());
    }

    #[test]
    fn drop_below_threshold_rearms() {
        let mut gate = AlertGate::new(0.7, 0);
        let hot = verdict(7, 10, true);
        let cold = verdict(6, 10, false);
        assert!(matches!(gate.observe("BTC", &hot, t0()), GateVerdict::Fire(_)));
        assert_eq!(gate.observe("BTC", &cold, t0()), GateVerdict::Rearmed);
        assert_eq!(gate.observe("BTC", &cold, t0()), GateVerdict::Idle);
        match gate.observe("BTC", &hot, t0() + Duration::seconds(60)) {
            GateVerdict::Fire(ev) => {
                assert_eq!(ev.positive_count, 7);
                assert_eq!(ev.at, t0() + Duration::seconds(60));
            }
            other => panic!("expected second alert, got {other:?}"),
        }
    }

    #[test]
    fn min_interval_keeps_topic_armed() {
        let mut gate = AlertGate::new(0.7, 3600);
        let hot = verdict(7, 10, true);
        let cold = verdict(2, 10, false);
        assert!(matches!(gate.observe("ETH", &hot, t0()), GateVerdict::Fire(_)));
        gate.observe("ETH", &cold, t0());
        let t1 = t0() + Duration::seconds(120);
        assert_eq!(gate.observe("ETH", &hot, t1), GateVerdict::RateLimited);
        assert!(gate.state_for("ETH").unwrap().armed());
        let t2 = t0() + Duration::seconds(3600);
        assert!(matches!(gate.observe("ETH", &hot, t2), GateVerdict::Fire(_)));
    }

    #[test]
    fn oversized_interval_is_clamped() {
        let mut gate = AlertGate::new(0.7, i64::MAX);
        let hot = verdict(7, 10, true);
        let cold = verdict(2, 10, false);
        assert!(matches!(gate.observe("BTC", &hot, t0()), GateVerdict::Fire(_)));
        gate.observe("BTC", &cold, t0());
        let later = t0() + Duration::seconds(MAX_ALERT_INTERVAL_SECS);
        assert!(matches!(gate.observe("BTC", &hot, later), GateVerdict::Fire(_)));
    }

    #[test]
    fn prime_enters_cooldown_without_event() {
        let mut gate = AlertGate::new(0.7, 0);
        assert!(gate.prime("SOL", &verdict(9, 10, true)));
        assert_eq!(
            gate.observe("SOL", &verdict(9, 10, true), t0()),
            GateVerdict::Suppressed
        );
        assert!(!gate.prime("ADA", &verdict(1, 10, false)));
        assert!(gate.state_for("ADA").is_none());
    }

    #[test]
    fn message_reports_fraction_and_percentage() {
        let ev = AlertEvent {
            topic: "BTC".into(),
            ratio: 0.7,
            positive_count: 7,
            sample_size: 10,
            at: t0(),
        };
        assert_eq!(
            ev.message(),
            "Positive sentiment alert for BTC! 7/10 recent posts (70.0%) are positive."
        );
    }
}
