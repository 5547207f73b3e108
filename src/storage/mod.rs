//! Durable observation storage behind a narrow put/query seam.

pub mod weaviate;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::ingest::types::RawPost;
use crate::sentiment::{normalize_topic, SentimentLabel, SentimentObservation};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// Label counts over a time frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentimentTrend {
    pub total: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub timeframe_hours: u32,
}

impl SentimentTrend {
    pub fn add(&mut self, label: SentimentLabel) {
        self.total += 1;
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Create whatever schema the backend needs. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Persist one observation. Re-putting the same `(topic, source_id)`
    /// must not create a second record.
    async fn put(
        &self,
        topic: &str,
        obs: &SentimentObservation,
        post: &RawPost,
    ) -> Result<(), StoreError>;

    /// Up to `n` most recent observations for `topic`, oldest first.
    async fn query_recent(
        &self,
        topic: &str,
        n: usize,
    ) -> Result<Vec<SentimentObservation>, StoreError>;

    async fn sentiment_trends(
        &self,
        topic: &str,
        timeframe_hours: u32,
    ) -> Result<SentimentTrend, StoreError>;

    fn name(&self) -> &'static str;
}

/// Rows kept per topic by [`MemoryStore::new`].
pub const DEFAULT_MEMORY_RETENTION: usize = 10_000;

#[derive(Debug, Default)]
struct TopicRows {
    rows: VecDeque<SentimentObservation>,
    ids: HashSet<String>,
}

/// Process-local store; useful for tests and for running without Weaviate.
/// Keeps at most `retention` rows per topic, dropping the oldest first.
#[derive(Debug)]
pub struct MemoryStore {
    retention: usize,
    inner: Mutex<HashMap<String, TopicRows>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_MEMORY_RETENTION)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `retention` is clamped to at least 1.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn len(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .map(|m| m.get(&normalize_topic(topic)).map_or(0, |t| t.rows.len()))
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unreachable("memory store mutex poisoned".to_string())
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn put(
        &self,
        topic: &str,
        obs: &SentimentObservation,
        _post: &RawPost,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        let t = map.entry(normalize_topic(topic)).or_default();
        if !t.ids.insert(obs.source_id.clone()) {
            return Ok(());
        }
        t.rows.push_back(obs.clone());
        while t.rows.len() > self.retention {
            if let Some(old) = t.rows.pop_front() {
                t.ids.remove(&old.source_id);
            }
        }
        Ok(())
    }

    async fn query_recent(
        &self,
        topic: &str,
        n: usize,
    ) -> Result<Vec<SentimentObservation>, StoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        let Some(t) = map.get(&normalize_topic(topic)) else {
            return Ok(Vec::new());
        };
        let start = t.rows.len().saturating_sub(n);
        Ok(t.rows.iter().skip(start).cloned().collect())
    }

    async fn sentiment_trends(
        &self,
        topic: &str,
        timeframe_hours: u32,
    ) -> Result<SentimentTrend, StoreError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(timeframe_hours as i64);
        let map = self.inner.lock().map_err(poisoned)?;
        let mut trend = SentimentTrend {
            timeframe_hours,
            ..Default::default()
        };
        for o in map.get(&normalize_topic(topic)).into_iter().flat_map(|t| &t.rows) {
            if o.timestamp >= cutoff {
                trend.add(o.label);
            }
        }
        Ok(trend)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn post(id: &str) -> RawPost {
        RawPost {
            id: id.into(),
            text: "BTC".into(),
            timestamp: Utc::now(),
            author: "alice".into(),
            author_name: None,
            retweet_count: 0,
            like_count: 0,
        }
    }

    #[tokio::test]
    async fn memory_store_is_idempotent_and_ordered() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let label = SentimentLabel::Positive;
            let o = SentimentObservation::new("btc", label, Utc::now(), i.to_string());
            store.put("BTC", &o, &post(&i.to_string())).await.unwrap();
        }
        let dup = SentimentObservation::new("BTC", SentimentLabel::Negative, Utc::now(), "4");
        store.put("BTC", &dup, &post("4")).await.unwrap();
        assert_eq!(store.len("btc"), 5);

        let recent = store.query_recent("BTC", 3).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|o| o.source_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn retention_drops_oldest_rows() {
        let store = MemoryStore::with_retention(3);
        for i in 0..5 {
            let label = SentimentLabel::Neutral;
            let o = SentimentObservation::new("SOL", label, Utc::now(), i.to_string());
            store.put("SOL", &o, &post(&i.to_string())).await.unwrap();
        }
        assert_eq!(store.len("SOL"), 3);
        let ids: Vec<String> = store
            .query_recent("SOL", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.source_id)
            .collect();
        assert_eq!(ids, vec!["2", "3", "4"]);

        // A retained id is still a duplicate; a trimmed one is accepted again.
        let kept = SentimentObservation::new("SOL", SentimentLabel::Neutral, Utc::now(), "4");
        store.put("SOL", &kept, &post("4")).await.unwrap();
        assert_eq!(store.len("SOL"), 3);
        let trimmed = SentimentObservation::new("SOL", SentimentLabel::Neutral, Utc::now(), "0");
        store.put("SOL", &trimmed, &post("0")).await.unwrap();
        let recent = store.query_recent("SOL", 1).await.unwrap();
        assert_eq!(recent[0].source_id, "0");
    }

    #[tokio::test]
    async fn trends_respect_timeframe() {
        let store = MemoryStore::new();
        let old = SentimentObservation::new(
            "ETH",
            SentimentLabel::Negative,
            Utc::now() - Duration::hours(48),
            "old",
        );
        let new = SentimentObservation::new("ETH", SentimentLabel::Positive, Utc::now(), "new");
        store.put("ETH", &old, &post("old")).await.unwrap();
        store.put("ETH", &new, &post("new")).await.unwrap();
        let t = store.sentiment_trends("ETH", 24).await.unwrap();
        assert_eq!(t.total, 1);
        assert_eq!(t.positive, 1);
        assert_eq!(t.timeframe_hours, 24);
    }
}
