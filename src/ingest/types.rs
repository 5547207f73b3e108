// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawPost {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Account handle without the leading `@`.
    pub author: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub like_count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed unreachable: {0}")]
    Unreachable(String),

    #[error("feed returned HTTP {0}")]
    Http(u16),

    #[error("feed rejected request: {0}")]
    Api(String),

    #[error("malformed feed response: {0}")]
    Malformed(String),

    #[error("feed is not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait SocialFeed: Send + Sync {
    /// Posts of `account` newer than `since`, oldest first.
    async fn fetch_new_posts(
        &self,
        account: &str,
        since: Option<&str>,
    ) -> Result<Vec<RawPost>, FeedError>;

    fn name(&self) -> &'static str;
}
