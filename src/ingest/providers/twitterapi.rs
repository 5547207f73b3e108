// src/ingest/providers/twitterapi.rs
//! TwitterAPI.io "last tweets" provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::types::{FeedError, RawPost, SocialFeed};

pub const DEFAULT_BASE_URL: &str = "https://api.twitterapi.io";
const LAST_TWEETS_PATH: &str = "/twitter/user/last_tweets";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    msg: Option<String>,
    data: Option<Data>,
}

#[derive(Debug, Deserialize)]
struct Data {
    #[serde(default)]
    tweets: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tweet {
    id: serde_json::Value,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    like_count: u64,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default, alias = "username")]
    user_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Accepts RFC 3339 or the classic Twitter format
/// (`Thu May 15 22:00:22 +0000 2025`).
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn id_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Snowflake ids compare numerically; anything else falls back to inequality.
fn is_newer(id: &str, since: &str) -> bool {
    match (id.parse::<u128>(), since.parse::<u128>()) {
        (Ok(a), Ok(b)) => a > b,
        _ => id != since,
    }
}

/// Parse a `last_tweets` response body into posts, oldest first. Posts not
/// newer than `since` are dropped. Unparseable `createdAt` falls back to `now`.
pub fn parse_last_tweets(
    body: &str,
    account: &str,
    since: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<RawPost>, FeedError> {
    let env: Envelope =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    if env.status != "success" {
        return Err(FeedError::Api(
            env.msg.unwrap_or_else(|| format!("status {:?}", env.status)),
        ));
    }
    let Some(data) = env.data else {
        return Err(FeedError::Malformed("missing data object".to_string()));
    };

    let mut out = Vec::with_capacity(data.tweets.len());
    for t in data.tweets {
        let Some(id) = id_string(&t.id) else {
            tracing::debug!(account, "tweet without id skipped");
            continue;
        };
        if let Some(s) = since {
            if !is_newer(&id, s) {
                continue;
            }
        }
        let timestamp = t
            .created_at
            .as_deref()
            .and_then(parse_created_at)
            .unwrap_or(now);
        let (author, author_name) = match t.author {
            Some(a) => (
                a.user_name.unwrap_or_else(|| account.to_string()),
                a.name,
            ),
            None => (account.to_string(), None),
        };
        out.push(RawPost {
            id,
            text: t.text,
            timestamp,
            author,
            author_name,
            retweet_count: t.retweet_count,
            like_count: t.like_count,
        });
    }

    // API lists newest first.
    out.reverse();
    Ok(out)
}

pub struct TwitterApiFeed {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    limit: u32,
}

impl TwitterApiFeed {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            limit: 20,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }
}

#[async_trait]
impl SocialFeed for TwitterApiFeed {
    async fn fetch_new_posts(
        &self,
        account: &str,
        since: Option<&str>,
    ) -> Result<Vec<RawPost>, FeedError> {
        if self.api_key.is_empty() {
            return Err(FeedError::NotConfigured("TWITTERAPI_KEY is empty"));
        }
        let t0 = std::time::Instant::now();

        let url = format!("{}{}", self.base_url, LAST_TWEETS_PATH);
        let limit = self.limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![("userName", account), ("limit", limit.as_str())];
        if let Some(s) = since {
            query.push(("since_id", s));
        }

        tracing::debug!(account, ?since, "fetching last tweets");
        let resp = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Http(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Unreachable(e.to_string()))?;

        let posts = parse_last_tweets(&body, account, since, Utc::now())?;

        counter!("monitor_posts_fetched_total").increment(posts.len() as u64);
        histogram!("monitor_feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        Ok(posts)
    }

    fn name(&self) -> &'static str {
        "twitterapi.io"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn twitter_date_format_parses() {
        let dt = parse_created_at("Thu May 15 22:00:22 +0000 2025").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 5, 15, 22, 0, 22).unwrap());
        let dt = parse_created_at("2025-05-15T22:00:22Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 5, 15, 22, 0, 22).unwrap());
        assert!(parse_created_at("yesterday").is_none());
    }

    #[test]
    fn newest_first_is_reversed_and_cursor_applied() {
        let body = r#"{"status":"success","data":{"tweets":[
            {"id":"103","text":"c","createdAt":"Thu May 15 22:03:00 +0000 2025","author":{"userName":"alice"}},
            {"id":"102","text":"b","createdAt":"Thu May 15 22:02:00 +0000 2025"},
            {"id":101,"text":"a","createdAt":"Thu May 15 22:01:00 +0000 2025"}
        ]}}"#;
        let now = Utc::now();
        let all = parse_last_tweets(body, "alice", None, now).unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);
        assert_eq!(all[1].author, "alice");

        let newer = parse_last_tweets(body, "alice", Some("101"), now).unwrap();
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].id, "102");
    }

    #[test]
    fn api_failure_is_reported() {
        let body = r#"{"status":"error","msg":"user not found"}"#;
        let err = parse_last_tweets(body, "ghost", None, Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::Api(m) if m == "user not found"));
        assert!(matches!(
            parse_last_tweets("<html>", "x", None, Utc::now()),
            Err(FeedError::Malformed(_))
        ));
    }
}
