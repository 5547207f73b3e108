//! Weaviate REST/GraphQL adapter for the `TweetSentiment` class.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ObservationStore, SentimentTrend, StoreError};
use crate::ingest::types::RawPost;
use crate::sentiment::{normalize_topic, SentimentLabel, SentimentObservation};

pub const CLASS_NAME: &str = "TweetSentiment";

/// Deterministic object id: replays of the same post for the same topic land
/// on the same object.
pub fn object_id(post_id: &str, topic: &str) -> Uuid {
    let name = format!("twitter:{post_id}#{}", normalize_topic(topic));
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

pub fn class_schema() -> serde_json::Value {
    json!({
        "class": CLASS_NAME,
        "vectorizer": "text2vec-openai",
        "properties": [
            { "name": "tweet_text", "dataType": ["text"] },
            { "name": "sentiment", "dataType": ["text"], "tokenization": "field" },
            { "name": "topic", "dataType": ["text"], "tokenization": "field" },
            { "name": "timestamp", "dataType": ["date"] },
            { "name": "source", "dataType": ["text"] },
            { "name": "tweet_id", "dataType": ["text"], "tokenization": "field" },
            { "name": "author_username", "dataType": ["text"], "tokenization": "field" },
            { "name": "author_name", "dataType": ["text"] },
            { "name": "retweet_count", "dataType": ["int"] },
            { "name": "like_count", "dataType": ["int"] }
        ]
    })
}

fn graphql_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn recent_query(topic: &str, n: usize) -> String {
    format!(
        "{{ Get {{ {CLASS_NAME}(where: {{ path: [\"topic\"], operator: Equal, valueText: {} }}, \
         limit: {n}, sort: [{{ path: [\"timestamp\"], order: desc }}]) \
         {{ sentiment timestamp tweet_id topic }} }} }}",
        graphql_string(&normalize_topic(topic))
    )
}

pub fn trends_query(topic: &str, since: DateTime<Utc>) -> String {
    format!(
        "{{ Get {{ {CLASS_NAME}(where: {{ operator: And, operands: [\
         {{ path: [\"topic\"], operator: Equal, valueText: {} }}, \
         {{ path: [\"timestamp\"], operator: GreaterThanEqual, valueDate: {} }}] }}, limit: 10000) \
         {{ sentiment timestamp tweet_id topic }} }} }}",
        graphql_string(&normalize_topic(topic)),
        graphql_string(&rfc3339(since))
    )
}

#[derive(Debug, Deserialize)]
struct GqlResp {
    data: Option<GqlData>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    #[serde(rename = "Get")]
    get: GqlGet,
}

#[derive(Debug, Deserialize)]
struct GqlGet {
    #[serde(rename = "TweetSentiment", default)]
    rows: Option<Vec<Row>>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    tweet_id: String,
    #[serde(default)]
    topic: Option<String>,
}

/// Rows of a `Get { TweetSentiment }` response as observations, in response
/// order. Rows with an unknown label or timestamp are dropped.
pub fn parse_get_rows(body: &str, topic: &str) -> Result<Vec<SentimentObservation>, StoreError> {
    let resp: GqlResp =
        serde_json::from_str(body).map_err(|e| StoreError::Malformed(e.to_string()))?;
    if let Some(first) = resp.errors.first() {
        return Err(StoreError::Malformed(first.message.clone()));
    }
    let rows = resp
        .data
        .and_then(|d| d.get.rows)
        .unwrap_or_default();

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let Some(label) = SentimentLabel::parse_loose(&r.sentiment) else {
            tracing::debug!(
                tweet_id = %r.tweet_id,
                sentiment = %r.sentiment,
                "row with unknown label skipped"
            );
            continue;
        };
        let Ok(ts) = DateTime::parse_from_rfc3339(&r.timestamp) else {
            tracing::debug!(tweet_id = %r.tweet_id, "row with bad timestamp skipped");
            continue;
        };
        let row_topic = r.topic.as_deref().unwrap_or(topic);
        out.push(SentimentObservation::new(
            row_topic,
            label,
            ts.with_timezone(&Utc),
            r.tweet_id,
        ));
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

pub struct WeaviateStore {
    http: reqwest::Client,
    base_url: String,
    openai_api_key: Option<String>,
}

impl WeaviateStore {
    pub fn new(
        base_url: impl Into<String>,
        openai_api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            openai_api_key: openai_api_key.filter(|k| !k.is_empty()),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let rb = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.openai_api_key {
            Some(k) => rb.header("X-OpenAI-Api-Key", k),
            None => rb,
        }
    }

    async fn graphql(
        &self,
        query: String,
        topic: &str,
    ) -> Result<Vec<SentimentObservation>, StoreError> {
        let resp = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }
        parse_get_rows(&body, topic)
    }
}

#[async_trait]
impl ObservationStore for WeaviateStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/v1/schema/{CLASS_NAME}"))
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        if resp.status().is_success() {
            tracing::info!(class = CLASS_NAME, "weaviate schema already exists");
            return Ok(());
        }

        let resp = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&class_schema())
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!(class = CLASS_NAME, "created weaviate schema");
        Ok(())
    }

    async fn put(
        &self,
        topic: &str,
        obs: &SentimentObservation,
        post: &RawPost,
    ) -> Result<(), StoreError> {
        let topic = normalize_topic(topic);
        let payload = json!({
            "class": CLASS_NAME,
            "id": object_id(&post.id, &topic).to_string(),
            "properties": {
                "tweet_text": post.text,
                "sentiment": obs.label.as_str(),
                "topic": topic,
                "timestamp": rfc3339(obs.timestamp),
                "source": format!("@{}", post.author),
                "tweet_id": post.id,
                "author_username": post.author,
                "author_name": post.author_name.clone().unwrap_or_else(|| "Unknown".to_string()),
                "retweet_count": post.retweet_count,
                "like_count": post.like_count,
            }
        });

        let resp = self
            .request(reqwest::Method::POST, "/v1/objects")
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        // Same deterministic id already stored: idempotent success.
        if status.as_u16() == 422 && body.contains("already exists") {
            tracing::debug!(tweet_id = %post.id, topic = %topic, "object already stored");
            return Ok(());
        }
        Err(StoreError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn query_recent(
        &self,
        topic: &str,
        n: usize,
    ) -> Result<Vec<SentimentObservation>, StoreError> {
        let mut rows = self.graphql(recent_query(topic, n), topic).await?;
        // Query sorts newest first.
        rows.reverse();
        Ok(rows)
    }

    async fn sentiment_trends(
        &self,
        topic: &str,
        timeframe_hours: u32,
    ) -> Result<SentimentTrend, StoreError> {
        let since = Utc::now() - chrono::Duration::hours(timeframe_hours as i64);
        let rows = self.graphql(trends_query(topic, since), topic).await?;
        let mut trend = SentimentTrend {
            timeframe_hours,
            ..Default::default()
        };
        for r in rows {
            trend.add(r.label);
        }
        Ok(trend)
    }

    fn name(&self) -> &'static str {
        "weaviate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_deterministic_per_topic() {
        assert_eq!(object_id("123", "btc"), object_id("123", "BTC"));
        assert_ne!(object_id("123", "BTC"), object_id("123", "ETH"));
        assert_eq!(object_id("123", "BTC").get_version_num(), 5);
    }

    #[test]
    fn recent_query_escapes_topic() {
        let q = recent_query("btc", 10);
        assert!(q.contains("valueText: \"BTC\""));
        assert!(q.contains("limit: 10"));
        assert!(q.contains("order: desc"));
    }

    #[test]
    fn get_rows_parse_and_skip_garbage() {
        let body = r#"{"data":{"Get":{"TweetSentiment":[
            {"sentiment":"positive","timestamp":"2025-05-15T22:00:22Z","tweet_id":"2","topic":"BTC"},
            {"sentiment":"??","timestamp":"2025-05-15T22:00:21Z","tweet_id":"x","topic":"BTC"},
            {"sentiment":"negative","timestamp":"2025-05-15T22:00:20Z","tweet_id":"1"}
        ]}}}"#;
        let rows = parse_get_rows(body, "BTC").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].topic, "BTC");
        assert_eq!(rows[1].label, SentimentLabel::Negative);
    }

    #[test]
    fn graphql_errors_surface() {
        let body = r#"{"errors":[{"message":"Cannot query field"}]}"#;
        assert!(matches!(
            parse_get_rows(body, "BTC"),
            Err(StoreError::Malformed(m)) if m.contains("Cannot query")
        ));
    }
}
