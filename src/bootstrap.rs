// src/bootstrap.rs
//! Build the concrete collaborators from [`Settings`].
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::analyze::ai_adapter::OpenAiClassifier;
use crate::analyze::Classifier;
use crate::config::{Channel, Settings};
use crate::ingest::providers::twitterapi::TwitterApiFeed;
use crate::ingest::types::SocialFeed;
use crate::notify::discord::DiscordNotifier;
use crate::notify::email::EmailSender;
use crate::notify::telegram::TelegramNotifier;
use crate::notify::{ConsoleNotifier, NotifierMux};
use crate::storage::weaviate::WeaviateStore;
use crate::storage::{MemoryStore, ObservationStore};

pub struct Runtime {
    pub feed: Arc<dyn SocialFeed>,
    pub classifier: Arc<dyn Classifier>,
    pub store: Arc<dyn ObservationStore>,
    pub notifier: NotifierMux,
}

impl Runtime {
    pub fn from_settings(s: &Settings) -> Result<Self> {
        // Safe diagnostics: key lengths only
        info!(
            "runtime: twitterapi_key_len={}, openai_key_len={}, model={}, weaviate={}",
            s.twitterapi_key.len(),
            s.openai_api_key.len(),
            s.openai_model,
            if s.weaviate_url.is_empty() { "<memory>" } else { s.weaviate_url.as_str() }
        );

        Ok(Self {
            feed: build_feed(s)?,
            classifier: build_classifier(s)?,
            store: build_store(s)?,
            notifier: build_notifier(s)?,
        })
    }
}

pub fn build_feed(s: &Settings) -> Result<Arc<dyn SocialFeed>> {
    if s.twitterapi_key.is_empty() {
        warn!("TWITTERAPI_KEY not set; every fetch will fail");
    }
    Ok(Arc::new(TwitterApiFeed::new(s.twitterapi_key.clone())?))
}

pub fn build_classifier(s: &Settings) -> Result<Arc<dyn Classifier>> {
    if s.openai_api_key.is_empty() {
        warn!("OPENAI_API_KEY not set; every classification will fail");
    }
    Ok(Arc::new(OpenAiClassifier::new(
        s.openai_api_key.clone(),
        Some(s.openai_model.as_str()),
    )?))
}

pub fn build_store(s: &Settings) -> Result<Arc<dyn ObservationStore>> {
    if s.weaviate_url.is_empty() {
        return Ok(Arc::new(MemoryStore::with_retention(s.memory_retention)));
    }
    let key = Some(s.openai_api_key.clone()).filter(|k| !k.is_empty());
    Ok(Arc::new(WeaviateStore::new(s.weaviate_url.clone(), key)?))
}

/// Channels with incomplete credentials are skipped with a warning. Falls back
/// to console when nothing else is usable.
pub fn build_notifier(s: &Settings) -> Result<NotifierMux> {
    let mut mux = NotifierMux::new();
    for ch in s.channels()? {
        match ch {
            Channel::Console => mux.push(Arc::new(ConsoleNotifier)),
            Channel::Telegram => match (&s.telegram_token, &s.telegram_chat_id) {
                (Some(token), Some(chat)) => {
                    mux.push(Arc::new(TelegramNotifier::new(token.clone(), chat.clone())))
                }
                _ => {
                    warn!("telegram selected but TELEGRAM_TOKEN/TELEGRAM_CHAT_ID missing; skipped")
                }
            },
            Channel::Discord => match &s.discord_webhook_url {
                Some(url) => mux.push(Arc::new(
                    DiscordNotifier::new(url.clone()).with_retries(s.notify_retries),
                )),
                None => warn!("discord selected but DISCORD_WEBHOOK_URL missing; skipped"),
            },
            Channel::Email => match &s.smtp {
                Some(smtp) => {
                    let sender = EmailSender::from_settings(smtp).context("email channel")?;
                    mux.push(Arc::new(sender));
                }
                None => warn!("email selected but SMTP settings incomplete; skipped"),
            },
        }
    }
    if mux.is_empty() {
        warn!("no usable notification channel; falling back to console");
        mux.push(Arc::new(ConsoleNotifier));
    }
    info!(channels = ?mux.channel_names(), "notifier ready");
    Ok(mux)
}
