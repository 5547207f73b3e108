use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way label returned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, SentimentLabel::Positive)
    }

    /// Lenient parse of a model completion: first alphabetic token, any case,
    /// surrounding quotes and punctuation ignored. Returns `None` for anything
    /// that is not one of the three labels.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let token = raw
            .split(|c: char| !c.is_alphabetic())
            .find(|t| !t.is_empty())?
            .to_ascii_lowercase();
        match token.as_str() {
            "positive" | "pos" | "bullish" => Some(SentimentLabel::Positive),
            "neutral" | "neu" => Some(SentimentLabel::Neutral),
            "negative" | "neg" | "bearish" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical topic key: trimmed and upper-cased ("btc " -> "BTC").
pub fn normalize_topic(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// One labelled post attributed to one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub topic: String,
    pub label: SentimentLabel,
    pub timestamp: DateTime<Utc>,
    /// Id of the originating post; the dedup key within a topic.
    pub source_id: String,
}

impl SentimentObservation {
    pub fn new(
        topic: impl AsRef<str>,
        label: SentimentLabel,
        timestamp: DateTime<Utc>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            topic: normalize_topic(topic.as_ref()),
            label,
            timestamp,
            source_id: source_id.into(),
        }
    }
}
