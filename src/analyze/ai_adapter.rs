//! OpenAI-backed sentiment classifier (Chat Completions API).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{label_from_completion, sentiment_prompt, ClassificationError, Classifier};
use crate::sentiment::SentimentLabel;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: impl Into<String>, model: Option<&str>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-sentiment-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.unwrap_or(DEFAULT_OPENAI_MODEL).to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        })
    }

    /// Point at a compatible endpoint (proxy, local gateway).
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassificationError> {
        if self.api_key.is_empty() {
            return Err(ClassificationError::NotConfigured("OPENAI_API_KEY is empty"));
        }

        let prompt = sentiment_prompt(text);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: "You are a sentiment classifier. Answer with exactly one word: positive, neutral or negative.",
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: 2,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ClassificationError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClassificationError::Http(status.as_u16()));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ClassificationError::Malformed(e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassificationError::Malformed("no choices".to_string()))?;

        label_from_completion(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_key_is_not_configured() {
        let c = OpenAiClassifier::new("", None).unwrap();
        assert_eq!(c.model(), DEFAULT_OPENAI_MODEL);
        let err = c.classify("BTC looks strong").await.unwrap_err();
        assert!(matches!(err, ClassificationError::NotConfigured(_)));
    }

    #[test]
    fn response_shape_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Negative"}}]}"#;
        let body: Resp = serde_json::from_str(raw).unwrap();
        let label = label_from_completion(&body.choices[0].message.content).unwrap();
        assert_eq!(label, SentimentLabel::Negative);
    }
}
