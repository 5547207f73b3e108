//! # Monitor
//! The orchestration loop. Once per interval, for every account: fetch new
//! posts, match topics, classify each matching post once, and push each
//! observation through record store -> aggregation policy -> alert gate, in
//! arrival order. Emitted alerts go to the notifier right away.
//!
//! Failures are scoped: a feed error skips one account, a classification
//! error skips one post, a store or delivery error is logged and counted.
//! Nothing a collaborator does can stop the cycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::analyze::Classifier;
use crate::antiflutter::{AlertEvent, AlertGate, GateState, GateVerdict};
use crate::config::MonitorConfig;
use crate::ingest::types::{RawPost, SocialFeed};
use crate::ingest::{match_topics, normalize_text};
use crate::metrics::ensure_metrics_described;
use crate::notify::{Delivery, Notification, NotifierMux};
use crate::policy::{AggregationPolicy, AggregationResult};
use crate::sentiment::SentimentObservation;
use crate::status::{StatusBoard, StatusSnapshot, TopicStatus};
use crate::storage::ObservationStore;
use crate::window::{IngestOutcome, SentimentStore};

/// Result of pushing one observation through the core.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub outcome: IngestOutcome,
    /// `None` for duplicates: nothing changed, nothing evaluated.
    pub result: Option<AggregationResult>,
    pub verdict: Option<GateVerdict>,
}

impl Step {
    pub fn alert(&self) -> Option<&AlertEvent> {
        match &self.verdict {
            Some(GateVerdict::Fire(ev)) => Some(ev),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertOutcome {
    pub event: AlertEvent,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub posts_fetched: usize,
    pub posts_matched: usize,
    pub feed_errors: usize,
    pub classify_errors: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub store_errors: usize,
    pub alerts: Vec<AlertOutcome>,
}

pub struct Monitor {
    cfg: MonitorConfig,
    accounts: Vec<String>,
    feed: Arc<dyn SocialFeed>,
    classifier: Arc<dyn Classifier>,
    store: Option<Arc<dyn ObservationStore>>,
    notifier: NotifierMux,

    window: SentimentStore,
    policy: AggregationPolicy,
    gate: AlertGate,
    /// Newest processed post id per account.
    cursors: HashMap<String, String>,
    status: StatusBoard,
    cycles: u64,
}

impl Monitor {
    pub fn new(
        cfg: MonitorConfig,
        accounts: Vec<String>,
        feed: Arc<dyn SocialFeed>,
        classifier: Arc<dyn Classifier>,
        notifier: NotifierMux,
    ) -> Self {
        ensure_metrics_described();
        let policy = AggregationPolicy::new(cfg.alert_threshold, cfg.min_sample_size);
        let gate = AlertGate::new(cfg.alert_threshold, cfg.min_alert_interval_secs);
        Self {
            window: SentimentStore::new(cfg.window_size),
            policy,
            gate,
            cfg,
            accounts,
            feed,
            classifier,
            store: None,
            notifier,
            cursors: HashMap::new(),
            status: StatusBoard::new(),
            cycles: 0,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ObservationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shared handle for readers (HTTP status surface).
    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    pub fn window(&self) -> &SentimentStore {
        &self.window
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    pub fn evaluate(&self, topic: &str) -> AggregationResult {
        self.policy.evaluate(&self.window, topic)
    }

    /// Ingest one observation, re-evaluate its topic and run the gate.
    pub fn observe(&mut self, obs: SentimentObservation) -> Step {
        let topic = obs.topic.clone();
        let outcome = self.window.ingest(obs);
        if outcome == IngestOutcome::DuplicateSkipped {
            counter!("monitor_observations_duplicate_total").increment(1);
            return Step {
                outcome,
                result: None,
                verdict: None,
            };
        }
        counter!("monitor_observations_ingested_total").increment(1);

        let result = self.policy.evaluate(&self.window, &topic);
        gauge!("monitor_topic_positive_ratio", "topic" => topic.clone()).set(result.ratio);

        let verdict = self.gate.observe(&topic, &result, Utc::now());
        match &verdict {
            GateVerdict::Fire(ev) => {
                counter!("monitor_alerts_emitted_total").increment(1);
                info!(target: "monitor", topic = %ev.topic, ratio = ev.ratio, "alert fired");
            }
            GateVerdict::Rearmed => {
                info!(target: "monitor", topic = %topic, ratio = result.ratio, "re-armed")
            }
            GateVerdict::RateLimited => {
                debug!(target: "monitor", topic = %topic, "alert rate-limited")
            }
            GateVerdict::Suppressed | GateVerdict::Idle => {}
        }

        Step {
            outcome,
            result: Some(result),
            verdict: Some(verdict),
        }
    }

    /// Warm-start topic windows from the persistent store. Topics already
    /// above threshold enter Cooldown without alerting. Returns the number of
    /// observations loaded.
    ///
    /// Loads a full dedup horizon per topic, not just one window. The older
    /// rows only seed the duplicate ledger, so a feed replaying its recent
    /// posts after a restart cannot push stale observations into the window.
    pub async fn hydrate(&mut self) -> usize {
        let Some(store) = self.store.clone() else {
            return 0;
        };
        let depth = self.window.dedup_horizon();
        let mut loaded = 0;
        for topic in self.cfg.topics.clone() {
            match store.query_recent(&topic, depth).await {
                Ok(rows) => {
                    for mut obs in rows {
                        obs.topic = topic.clone();
                        if self.window.ingest(obs) == IngestOutcome::Inserted {
                            loaded += 1;
                        }
                    }
                    let result = self.evaluate(&topic);
                    if self.gate.prime(&topic, &result) {
                        info!(
                            target: "monitor",
                            topic = %topic,
                            ratio = result.ratio,
                            "hydrated above threshold; starting in cooldown"
                        );
                    }
                }
                Err(e) => {
                    counter!("monitor_store_errors_total").increment(1);
                    warn!(target: "monitor", topic = %topic, error = %e, "hydrate failed");
                }
            }
        }
        self.publish_status();
        loaded
    }

    /// One full pass over every account, `poll_batch_size` accounts at a time
    /// with `poll_batch_pause` between batches.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let batch = self.cfg.poll_batch_size.max(1);

        for (i, account) in self.accounts.clone().into_iter().enumerate() {
            if i > 0 && i % batch == 0 && !self.cfg.poll_batch_pause.is_zero() {
                debug!(
                    target: "monitor",
                    polled = i,
                    pause = ?self.cfg.poll_batch_pause,
                    "batch done; pausing"
                );
                time::sleep(self.cfg.poll_batch_pause).await;
            }

            let since = self.cursors.get(&account).cloned();
            let posts = match self.feed.fetch_new_posts(&account, since.as_deref()).await {
                Ok(p) => p,
                Err(e) => {
                    report.feed_errors += 1;
                    counter!("monitor_feed_errors_total").increment(1);
                    warn!(target: "monitor", account = %account, error = %e, "feed fetch failed");
                    continue;
                }
            };
            report.posts_fetched += posts.len();
            if !posts.is_empty() {
                info!(target: "monitor", account = %account, count = posts.len(), "fetched posts");
            }

            for post in &posts {
                self.process_post(post, &mut report).await;
                self.cursors.insert(account.clone(), post.id.clone());
            }
        }

        self.cycles += 1;
        self.publish_status();
        gauge!("monitor_last_cycle_ts").set(Utc::now().timestamp() as f64);
        report
    }

    async fn process_post(&mut self, post: &RawPost, report: &mut CycleReport) {
        let text = normalize_text(&post.text);
        let topics = match_topics(&text, &self.cfg.topics);
        if topics.is_empty() {
            return;
        }
        report.posts_matched += 1;
        counter!("monitor_posts_matched_total").increment(1);

        let label = match self.classifier.classify(&text).await {
            Ok(l) => l,
            Err(e) => {
                report.classify_errors += 1;
                counter!("monitor_classify_errors_total").increment(1);
                warn!(
                    target: "monitor",
                    post_id = %post.id,
                    classifier = self.classifier.name(),
                    error = %e,
                    "classification failed; post skipped"
                );
                return;
            }
        };
        debug!(target: "monitor", post_id = %post.id, %label, ?topics, "classified");

        for topic in topics {
            let obs =
                SentimentObservation::new(&topic, label, post.timestamp, post.id.clone());
            let step = self.observe(obs.clone());

            match step.outcome {
                IngestOutcome::DuplicateSkipped => {
                    report.duplicates += 1;
                    continue;
                }
                IngestOutcome::Inserted => report.inserted += 1,
            }

            if let Some(store) = &self.store {
                if let Err(e) = store.put(&topic, &obs, post).await {
                    report.store_errors += 1;
                    counter!("monitor_store_errors_total").increment(1);
                    warn!(
                        target: "monitor",
                        topic = %topic,
                        post_id = %post.id,
                        error = %e,
                        "store put failed"
                    );
                }
            }

            if let Some(ev) = step.alert() {
                let outcome = self.dispatch(ev).await;
                report.alerts.push(outcome);
            }
        }
    }

    /// Deliver an alert. A failed delivery is not retried here and does not
    /// re-arm the gate.
    async fn dispatch(&self, ev: &AlertEvent) -> AlertOutcome {
        let delivery = self.notifier.notify(&Notification::from_alert(ev)).await;
        if let Delivery::DeliveryFailed(reasons) = &delivery {
            counter!("monitor_alert_delivery_failures_total").increment(1);
            warn!(
                target: "monitor",
                topic = %ev.topic,
                ?reasons,
                "alert delivery failed; staying in cooldown"
            );
        }
        AlertOutcome {
            event: ev.clone(),
            delivery,
        }
    }

    fn publish_status(&self) {
        let topics = self
            .cfg
            .topics
            .iter()
            .map(|t| {
                let r = self.evaluate(t);
                let st = self.gate.state_for(t);
                TopicStatus {
                    topic: t.clone(),
                    ratio: r.ratio,
                    positive_count: r.positive_count,
                    sample_size: r.sample_size,
                    should_consider_alert: r.should_consider_alert,
                    state: st.map_or(GateState::Armed, |s| s.state),
                    last_alert_ratio: st.and_then(|s| s.last_alert_ratio),
                    last_alert_time: st.and_then(|s| s.last_alert_time),
                }
            })
            .collect();
        self.status.publish(StatusSnapshot {
            last_cycle: Some(Utc::now()),
            cycles: self.cycles,
            topics,
        });
    }

    /// Drive cycles until `shutdown` resolves. Missed ticks are skipped, so a
    /// slow cycle never overlaps the next one. A shutdown mid-cycle abandons
    /// the rest of the cycle; state committed so far is kept.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            target: "monitor",
            accounts = self.accounts.len(),
            topics = ?self.cfg.topics,
            interval_secs = self.cfg.interval.as_secs(),
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = &mut shutdown => {
                    warn!(target: "monitor", "shutdown during cycle; committed state kept");
                    break;
                }
                report = self.run_cycle() => {
                    info!(
                        target: "monitor",
                        fetched = report.posts_fetched,
                        matched = report.posts_matched,
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        classify_errors = report.classify_errors,
                        feed_errors = report.feed_errors,
                        alerts = report.alerts.len(),
                        "cycle done"
                    );
                }
            }
        }
        info!(target: "monitor", "monitor stopped");
    }
}
