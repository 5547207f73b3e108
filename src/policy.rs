//! Aggregation policy: turns a topic window into an alert verdict.

use serde::Serialize;

use crate::window::{Ratio, SentimentStore};

/// Default "7 of 10" threshold.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationPolicy {
    /// Positive ratio at or above which an alert is considered, in (0, 1].
    pub threshold: f64,
    /// No verdict below this many observations. At least 1.
    pub min_sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregationResult {
    pub ratio: f64,
    pub positive_count: usize,
    pub sample_size: usize,
    pub should_consider_alert: bool,
}

impl AggregationResult {
    pub fn fraction(&self) -> Ratio {
        Ratio::new(self.positive_count, self.sample_size)
    }
}

impl AggregationPolicy {
    pub fn new(threshold: f64, min_sample_size: usize) -> Self {
        Self {
            threshold,
            min_sample_size: min_sample_size.max(1),
        }
    }

    /// Full-window floor: no verdict until `window_size` observations exist.
    pub fn with_window(window_size: usize) -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD, window_size)
    }

    pub fn evaluate(&self, store: &SentimentStore, topic: &str) -> AggregationResult {
        self.evaluate_ratio(store.ratio_for(topic))
    }

    pub fn evaluate_ratio(&self, ratio: Ratio) -> AggregationResult {
        let above_floor = ratio.total >= self.min_sample_size;
        AggregationResult {
            ratio: ratio.as_f64(),
            positive_count: ratio.positive,
            sample_size: ratio.total,
            should_consider_alert: above_floor && ratio.at_least(self.threshold),
        }
    }

    /// True when `result` sits strictly below the threshold (re-arm condition).
    pub fn is_below_threshold(&self, result: &AggregationResult) -> bool {
        !result.fraction().at_least(self.threshold)
    }
}
