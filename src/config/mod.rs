// src/config/mod.rs
//! Settings: optional TOML file, then environment overrides, then validation
//! into [`MonitorConfig`]. Invalid settings are fatal before the loop starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::antiflutter::MAX_ALERT_INTERVAL_SECS;
use crate::sentiment::normalize_topic;

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";
pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("alert_threshold must be in (0, 1], got {0}")]
    Threshold(f64),

    #[error("window_size must be at least 1")]
    WindowSize,

    #[error("min_sample_size must be in [1, {window}], got {min}")]
    MinSampleSize { min: usize, window: usize },

    #[error("monitoring_interval must be at least 1 second")]
    Interval,

    #[error("min_alert_interval_secs must be between 0 and 30 days, got {0}")]
    AlertInterval(i64),

    #[error("poll_batch_size must be at least 1")]
    PollBatchSize,

    #[error("no target keywords configured")]
    NoTopics,

    #[error("unknown notification channel {0:?}")]
    UnknownChannel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Console,
    Telegram,
    Discord,
    Email,
}

fn default_openai_model() -> String {
    crate::analyze::ai_adapter::DEFAULT_OPENAI_MODEL.to_string()
}
fn default_weaviate_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_notification_method() -> String {
    "console".to_string()
}
fn default_notify_retries() -> u8 {
    3
}
fn default_interval() -> u64 {
    300
}
fn default_keywords() -> Vec<String> {
    vec!["BTC".into(), "ETH".into(), "SOL".into()]
}
fn default_accounts_file() -> PathBuf {
    PathBuf::from("accounts.csv")
}
fn default_window_size() -> usize {
    10
}
fn default_threshold() -> f64 {
    crate::policy::DEFAULT_ALERT_THRESHOLD
}
fn default_poll_batch_size() -> usize {
    5
}
fn default_poll_batch_pause_ms() -> u64 {
    2000
}
fn default_memory_retention() -> usize {
    crate::storage::DEFAULT_MEMORY_RETENTION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub twitterapi_key: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Empty string disables durable storage (in-process memory store).
    #[serde(default = "default_weaviate_url")]
    pub weaviate_url: String,

    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
    /// `console`, `telegram`, `discord`, `email`, `all`, or a comma list.
    #[serde(default = "default_notification_method")]
    pub notification_method: String,
    #[serde(default = "default_notify_retries")]
    pub notify_retries: u8,

    /// Seconds between cycles.
    #[serde(default = "default_interval")]
    pub monitoring_interval: u64,
    #[serde(default = "default_keywords")]
    pub target_keywords: Vec<String>,
    #[serde(default = "default_accounts_file")]
    pub accounts_file: PathBuf,
    /// Accounts fetched back to back before pausing.
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: usize,
    /// Pause between account batches; 0 disables it.
    #[serde(default = "default_poll_batch_pause_ms")]
    pub poll_batch_pause_ms: u64,
    /// Rows kept per topic by the in-process store.
    #[serde(default = "default_memory_retention")]
    pub memory_retention: usize,

    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Ratio in (0, 1]; an integer above 1 is read as "count out of window".
    #[serde(default = "default_threshold")]
    pub sentiment_threshold: f64,
    /// Defaults to `window_size`.
    #[serde(default)]
    pub min_sample_size: Option<usize>,
    #[serde(default)]
    pub min_alert_interval_secs: i64,

    /// e.g. "127.0.0.1:8088"; status server disabled when absent.
    #[serde(default)]
    pub status_addr: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            twitterapi_key: String::new(),
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            weaviate_url: default_weaviate_url(),
            telegram_token: None,
            telegram_chat_id: None,
            discord_webhook_url: None,
            smtp: None,
            notification_method: default_notification_method(),
            notify_retries: default_notify_retries(),
            monitoring_interval: default_interval(),
            target_keywords: default_keywords(),
            accounts_file: default_accounts_file(),
            poll_batch_size: default_poll_batch_size(),
            poll_batch_pause_ms: default_poll_batch_pause_ms(),
            memory_retention: default_memory_retention(),
            window_size: default_window_size(),
            sentiment_threshold: default_threshold(),
            min_sample_size: None,
            min_alert_interval_secs: 0,
            status_addr: None,
        }
    }
}

/// Validated knobs of the aggregation core and loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub window_size: usize,
    pub alert_threshold: f64,
    pub min_sample_size: usize,
    pub min_alert_interval_secs: i64,
    pub interval: Duration,
    pub poll_batch_size: usize,
    pub poll_batch_pause: Duration,
    pub topics: Vec<String>,
}

impl MonitorConfig {
    /// Defaults (10 / 0.7 / full window, 300s, batches of 5 with 2s pauses)
    /// for the given topics.
    pub fn with_topics<S: AsRef<str>>(topics: &[S]) -> Self {
        Self {
            window_size: default_window_size(),
            alert_threshold: default_threshold(),
            min_sample_size: default_window_size(),
            min_alert_interval_secs: 0,
            interval: Duration::from_secs(default_interval()),
            poll_batch_size: default_poll_batch_size(),
            poll_batch_pause: Duration::from_millis(default_poll_batch_pause_ms()),
            topics: topics.iter().map(|t| normalize_topic(t.as_ref())).collect(),
        }
    }
}

impl Settings {
    /// Load from an explicit file, else `$MONITOR_CONFIG_PATH`, else
    /// `config/monitor.toml` when present, else defaults. Environment
    /// overrides are applied on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));

        let mut settings = match path {
            Some(p) => Self::from_file(&p)?,
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|k| std::env::var(k).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Override fields from environment-style keys.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("TWITTERAPI_KEY") {
            self.twitterapi_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = lookup("WEAVIATE_URL") {
            self.weaviate_url = v.trim().to_string();
        }
        if let Some(v) = get("TELEGRAM_TOKEN") {
            self.telegram_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram_chat_id = Some(v);
        }
        if let Some(v) = get("DISCORD_WEBHOOK_URL") {
            self.discord_webhook_url = Some(v);
        }
        if let Some(v) = get("NOTIFICATION_METHOD") {
            self.notification_method = v;
        }
        if let Some(v) = get("NOTIFY_RETRIES") {
            self.notify_retries = parse_key("NOTIFY_RETRIES", &v)?;
        }
        if let Some(v) = get("MONITORING_INTERVAL") {
            self.monitoring_interval = parse_key("MONITORING_INTERVAL", &v)?;
        }
        if let Some(v) = get("TARGET_KEYWORDS") {
            self.target_keywords = v
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
        if let Some(v) = get("ACCOUNTS_FILE") {
            self.accounts_file = PathBuf::from(v);
        }
        if let Some(v) = get("POLL_BATCH_SIZE") {
            self.poll_batch_size = parse_key("POLL_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("POLL_BATCH_PAUSE_MS") {
            self.poll_batch_pause_ms = parse_key("POLL_BATCH_PAUSE_MS", &v)?;
        }
        if let Some(v) = get("MEMORY_RETENTION") {
            self.memory_retention = parse_key("MEMORY_RETENTION", &v)?;
        }
        if let Some(v) = get("WINDOW_SIZE") {
            self.window_size = parse_key("WINDOW_SIZE", &v)?;
        }
        if let Some(v) = get("SENTIMENT_THRESHOLD") {
            self.sentiment_threshold = parse_key("SENTIMENT_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MIN_SAMPLE_SIZE") {
            self.min_sample_size = Some(parse_key("MIN_SAMPLE_SIZE", &v)?);
        }
        if let Some(v) = get("MIN_ALERT_INTERVAL_SECS") {
            self.min_alert_interval_secs = parse_key("MIN_ALERT_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("STATUS_ADDR") {
            self.status_addr = Some(v);
        }

        let smtp_keys = (
            get("SMTP_HOST"),
            get("SMTP_USER"),
            get("SMTP_PASS"),
            get("NOTIFY_EMAIL_FROM"),
            get("NOTIFY_EMAIL_TO"),
        );
        if let (Some(host), Some(user), Some(pass), Some(from), Some(to)) = smtp_keys {
            self.smtp = Some(SmtpSettings {
                host,
                user,
                pass,
                from,
                to,
            });
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::WindowSize);
        }

        let raw = self.sentiment_threshold;
        let threshold = if raw > 1.0 && raw.fract() == 0.0 {
            raw / self.window_size as f64
        } else {
            raw
        };
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Threshold(raw));
        }

        let min = self.min_sample_size.unwrap_or(self.window_size);
        if min == 0 || min > self.window_size {
            return Err(ConfigError::MinSampleSize {
                min,
                window: self.window_size,
            });
        }

        if self.monitoring_interval == 0 {
            return Err(ConfigError::Interval);
        }
        if !(0..=MAX_ALERT_INTERVAL_SECS).contains(&self.min_alert_interval_secs) {
            return Err(ConfigError::AlertInterval(self.min_alert_interval_secs));
        }
        if self.poll_batch_size == 0 {
            return Err(ConfigError::PollBatchSize);
        }

        let mut topics: Vec<String> = Vec::new();
        for t in &self.target_keywords {
            let key = normalize_topic(t);
            if !key.is_empty() && !topics.contains(&key) {
                topics.push(key);
            }
        }
        if topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }

        Ok(MonitorConfig {
            window_size: self.window_size,
            alert_threshold: threshold,
            min_sample_size: min,
            min_alert_interval_secs: self.min_alert_interval_secs,
            interval: Duration::from_secs(self.monitoring_interval),
            poll_batch_size: self.poll_batch_size,
            poll_batch_pause: Duration::from_millis(self.poll_batch_pause_ms),
            topics,
        })
    }

    pub fn channels(&self) -> Result<Vec<Channel>, ConfigError> {
        let mut out = Vec::new();
        for part in self.notification_method.split(',') {
            let part = part.trim().to_ascii_lowercase();
            let add: &[Channel] = match part.as_str() {
                "" => &[],
                "console" => &[Channel::Console],
                "telegram" => &[Channel::Telegram],
                "discord" => &[Channel::Discord],
                "email" => &[Channel::Email],
                "all" => &[
                    Channel::Console,
                    Channel::Telegram,
                    Channel::Discord,
                    Channel::Email,
                ],
                _ => return Err(ConfigError::UnknownChannel(part)),
            };
            for c in add {
                if !out.contains(c) {
                    out.push(*c);
                }
            }
        }
        Ok(out)
    }
}

fn parse_key<T: std::str::FromStr>(key: &'static str, v: &str) -> Result<T, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: v.to_string(),
    })
}
