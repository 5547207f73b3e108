//! # Sentiment record store
//! Per-topic, fixed-capacity FIFO windows of the most recent observations.
//!
//! Each topic keeps the last `capacity` observations in arrival order. A
//! duplicate ledger remembers the `source_id`s of those observations plus a
//! bounded tail of recently evicted ones, so a post replayed by the feed is
//! never counted twice. No I/O happens here; durability is the job of the
//! storage collaborator.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::sentiment::{normalize_topic, SentimentObservation};

/// Outcome of [`SentimentStore::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// `source_id` already seen for this topic; nothing changed.
    DuplicateSkipped,
}

/// Exact `positive / total` fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub positive: usize,
    pub total: usize,
}

impl Ratio {
    pub fn new(positive: usize, total: usize) -> Self {
        debug_assert!(positive <= total);
        Self { positive, total }
    }

    /// 0.0 for an empty sample.
    pub fn as_f64(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.positive as f64 / self.total as f64
        }
    }

    /// `positive / total >= threshold`; never true for an empty sample.
    ///
    /// A single correctly rounded division keeps decimal boundaries exact:
    /// 7/10 and the literal 0.7 round to the same double.
    pub fn at_least(&self, threshold: f64) -> bool {
        self.total > 0 && self.as_f64() >= threshold
    }
}

/// Read-only copy of one topic's window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicWindow {
    pub topic: String,
    pub capacity: usize,
    pub observations: Vec<SentimentObservation>,
}

impl TopicWindow {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.observations.len() >= self.capacity
    }

    pub fn positive_count(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| o.label.is_positive())
            .count()
    }

    pub fn ratio(&self) -> Ratio {
        Ratio::new(self.positive_count(), self.len())
    }
}

#[derive(Debug, Default)]
struct TopicLog {
    buf: VecDeque<SentimentObservation>,
    /// Ids currently in `buf` or in `evicted`.
    seen: HashSet<String>,
    /// Ids of evicted observations, oldest first.
    evicted: VecDeque<String>,
}

/// Owner of every topic window. Windows are created lazily on first ingest.
#[derive(Debug)]
pub struct SentimentStore {
    capacity: usize,
    dedup_memory: usize,
    windows: HashMap<String, TopicLog>,
}

impl SentimentStore {
    /// `capacity` is clamped to at least 1. Evicted ids are remembered for
    /// four windows' worth of posts.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self::with_dedup_memory(capacity, capacity.saturating_mul(4))
    }

    /// `dedup_memory == 0` limits duplicate detection to the live window.
    pub fn with_dedup_memory(capacity: usize, dedup_memory: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            dedup_memory,
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many evicted ids per topic are still treated as duplicates.
    pub fn dedup_memory(&self) -> usize {
        self.dedup_memory
    }

    /// Ids the topic still rejects as duplicates: the live window plus the
    /// remembered evictions.
    pub fn dedup_horizon(&self) -> usize {
        self.capacity.saturating_add(self.dedup_memory)
    }

    pub fn ingest(&mut self, mut obs: SentimentObservation) -> IngestOutcome {
        obs.topic = normalize_topic(&obs.topic);
        let log = self.windows.entry(obs.topic.clone()).or_default();

        if log.seen.contains(&obs.source_id) {
            return IngestOutcome::DuplicateSkipped;
        }

        log.seen.insert(obs.source_id.clone());
        log.buf.push_back(obs);

        while log.buf.len() > self.capacity {
            if let Some(old) = log.buf.pop_front() {
                log.evicted.push_back(old.source_id);
            }
        }
        while log.evicted.len() > self.dedup_memory {
            if let Some(id) = log.evicted.pop_front() {
                log.seen.remove(&id);
            }
        }

        IngestOutcome::Inserted
    }

    /// `None` until the topic has received its first observation.
    pub fn window_for(&self, topic: &str) -> Option<TopicWindow> {
        let key = normalize_topic(topic);
        let log = self.windows.get(&key)?;
        Some(TopicWindow {
            topic: key,
            capacity: self.capacity,
            observations: log.buf.iter().cloned().collect(),
        })
    }

    /// Allocation-free ratio lookup; empty ratio for unknown topics.
    pub fn ratio_for(&self, topic: &str) -> Ratio {
        match self.windows.get(&normalize_topic(topic)) {
            Some(log) => Ratio::new(
                log.buf.iter().filter(|o| o.label.is_positive()).count(),
                log.buf.len(),
            ),
            None => Ratio::new(0, 0),
        }
    }

    /// Tracked topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut v: Vec<String> = self.windows.keys().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::SentimentLabel;
    use chrono::{Duration, TimeZone, Utc};

    fn obs(topic: &str, id: usize, label: SentimentLabel) -> SentimentObservation {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 15, 22, 0, 0).unwrap();
        SentimentObservation::new(topic, label, t0 + Duration::seconds(id as i64), id.to_string())
    }

    #[test]
    fn duplicate_source_id_is_skipped() {
        let mut store = SentimentStore::new(10);
        assert_eq!(
            store.ingest(obs("BTC", 1, SentimentLabel::Positive)),
            IngestOutcome::Inserted
        );
        assert_eq!(
            store.ingest(obs("BTC", 1, SentimentLabel::Negative)),
            IngestOutcome::DuplicateSkipped
        );
        let w = store.window_for("BTC").unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w.ratio(), Ratio::new(1, 1));
    }

    #[test]
    fn same_source_id_counts_once_per_topic() {
        let mut store = SentimentStore::new(10);
        store.ingest(obs("BTC", 1, SentimentLabel::Positive));
        assert_eq!(
            store.ingest(obs("ETH", 1, SentimentLabel::Positive)),
            IngestOutcome::Inserted
        );
        assert_eq!(store.topics(), vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn fifo_eviction_keeps_capacity() {
        let mut store = SentimentStore::new(10);
        for i in 0..13 {
            store.ingest(obs("btc", i, SentimentLabel::Neutral));
        }
        let w = store.window_for("BTC").unwrap();
        assert_eq!(w.len(), 10);
        let ids: Vec<&str> = w.observations.iter().map(|o| o.source_id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"3"));
        assert_eq!(ids.last(), Some(&"12"));
    }

    #[test]
    fn evicted_ids_stay_deduplicated_within_memory() {
        let mut store = SentimentStore::with_dedup_memory(2, 1);
        store.ingest(obs("BTC", 1, SentimentLabel::Positive));
        store.ingest(obs("BTC", 2, SentimentLabel::Positive));
        store.ingest(obs("BTC", 3, SentimentLabel::Positive)); // evicts 1
        assert_eq!(
            store.ingest(obs("BTC", 1, SentimentLabel::Positive)),
            IngestOutcome::DuplicateSkipped
        );
        store.ingest(obs("BTC", 4, SentimentLabel::Positive)); // evicts 2, forgets 1
        assert_eq!(
            store.ingest(obs("BTC", 1, SentimentLabel::Positive)),
            IngestOutcome::Inserted
        );
    }

    #[test]
    fn huge_capacity_does_not_overflow_dedup_memory() {
        let store = SentimentStore::new(usize::MAX);
        assert_eq!(store.dedup_memory(), usize::MAX);
        assert_eq!(store.dedup_horizon(), usize::MAX);
    }

    #[test]
    fn replaying_a_full_horizon_in_order_keeps_every_id() {
        let mut store = SentimentStore::with_dedup_memory(3, 3);
        for i in 1..=6 {
            store.ingest(obs("BTC", i, SentimentLabel::Positive));
        }
        for i in 1..=6 {
            assert_eq!(
                store.ingest(obs("BTC", i, SentimentLabel::Negative)),
                IngestOutcome::DuplicateSkipped
            );
        }
        assert_eq!(store.ratio_for("BTC"), Ratio::new(3, 3));
    }

    #[test]
    fn unknown_topic_is_empty() {
        let store = SentimentStore::new(10);
        assert!(store.window_for("SOL").is_none());
        assert_eq!(store.ratio_for("SOL"), Ratio::new(0, 0));
        assert!(!store.ratio_for("SOL").at_least(0.1));
    }

    #[test]
    fn ratio_boundary_is_exact() {
        assert!(Ratio::new(7, 10).at_least(0.7));
        assert!(!Ratio::new(6, 10).at_least(0.7));
        assert!(Ratio::new(10, 10).at_least(1.0));
    }
}
