// tests/common/mod.rs
//
// Scripted collaborators shared by the integration tests. No network.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crypto_sentiment_monitor::analyze::{ClassificationError, Classifier};
use crypto_sentiment_monitor::ingest::types::{FeedError, RawPost, SocialFeed};
use crypto_sentiment_monitor::notify::{Notification, Notifier};
use crypto_sentiment_monitor::SentimentLabel;

pub fn post(id: u64, text: &str) -> RawPost {
    RawPost {
        id: id.to_string(),
        text: text.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + Duration::seconds(id as i64),
        author: "whale".to_string(),
        author_name: None,
        retweet_count: 0,
        like_count: 0,
    }
}

/// One batch per call, per account. Records the `since` cursor it was given.
/// A stalled account never answers.
#[derive(Default)]
pub struct ScriptedFeed {
    batches: Mutex<HashMap<String, VecDeque<Result<Vec<RawPost>, FeedError>>>>,
    stalled: Mutex<HashSet<String>>,
    pub cursors_seen: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, account: &str, posts: Vec<RawPost>) {
        self.batches
            .lock()
            .unwrap()
            .entry(account.to_string())
            .or_default()
            .push_back(Ok(posts));
    }

    pub fn push_error(&self, account: &str) {
        self.batches
            .lock()
            .unwrap()
            .entry(account.to_string())
            .or_default()
            .push_back(Err(FeedError::Http(503)));
    }

    pub fn stall(&self, account: &str) {
        self.stalled.lock().unwrap().insert(account.to_string());
    }
}

#[async_trait]
impl SocialFeed for ScriptedFeed {
    async fn fetch_new_posts(
        &self,
        account: &str,
        since: Option<&str>,
    ) -> Result<Vec<RawPost>, FeedError> {
        self.cursors_seen
            .lock()
            .unwrap()
            .push((account.to_string(), since.map(str::to_string)));
        let stalled = self.stalled.lock().unwrap().contains(account);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.batches
            .lock()
            .unwrap()
            .get_mut(account)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(Vec::new()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// "moon" -> positive, "dump" -> negative, "garbled" -> error, else neutral.
#[derive(Default)]
pub struct KeywordClassifier {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassificationError> {
        *self.calls.lock().unwrap() += 1;
        let t = text.to_lowercase();
        if t.contains("garbled") {
            Err(ClassificationError::UnrecognizedLabel("maybe".into()))
        } else if t.contains("moon") {
            Ok(SentimentLabel::Positive)
        } else if t.contains("dump") {
            Ok(SentimentLabel::Negative)
        } else {
            Ok(SentimentLabel::Neutral)
        }
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Records every notification; fails when `failing` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        if self.failing {
            return Err(anyhow!("channel down"));
        }
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
