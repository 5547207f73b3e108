// src/analyze/mod.rs
//! Sentiment classification seam. The monitor only sees [`Classifier`];
//! the hosted model lives behind it in [`ai_adapter`].

pub mod ai_adapter;

use async_trait::async_trait;

use crate::sentiment::SentimentLabel;

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("classifier unreachable: {0}")]
    Unreachable(String),

    #[error("classifier returned HTTP {0}")]
    Http(u16),

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("unrecognized sentiment label: {0:?}")]
    UnrecognizedLabel(String),

    #[error("classifier is not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassificationError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Maps a raw completion to a label, rejecting anything unrecognized.
pub fn label_from_completion(raw: &str) -> Result<SentimentLabel, ClassificationError> {
    SentimentLabel::parse_loose(raw)
        .ok_or_else(|| ClassificationError::UnrecognizedLabel(raw.trim().to_string()))
}

/// Prompt shared by the hosted classifiers.
pub fn sentiment_prompt(post_text: &str) -> String {
    format!(
        "Analyze the sentiment of this tweet as either 'positive', 'neutral', or 'negative'.\n\n\
         Tweet: \"{post_text}\"\n\n\
         Sentiment: "
    )
}
