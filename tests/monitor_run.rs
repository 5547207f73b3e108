// tests/monitor_run.rs
//
// The interval loop and account pacing, on a paused clock.
//
// Covered:
// - one cycle per tick until shutdown
// - shutdown mid-cycle keeps what the cycle already committed
// - accounts are polled in batches with a pause in between

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crypto_sentiment_monitor::config::MonitorConfig;
use crypto_sentiment_monitor::ingest::types::RawPost;
use crypto_sentiment_monitor::notify::NotifierMux;
use crypto_sentiment_monitor::Monitor;

use common::{post, KeywordClassifier, RecordingNotifier, ScriptedFeed};

fn monitor(
    cfg: MonitorConfig,
    accounts: &[&str],
) -> (Monitor, Arc<ScriptedFeed>, Arc<RecordingNotifier>) {
    let feed = Arc::new(ScriptedFeed::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let m = Monitor::new(
        cfg,
        accounts.iter().map(|a| a.to_string()).collect(),
        feed.clone(),
        Arc::new(KeywordClassifier::default()),
        NotifierMux::new().with(notifier.clone()),
    );
    (m, feed, notifier)
}

fn hot_batch() -> Vec<RawPost> {
    (1..=10)
        .map(|id| post(id, if id <= 8 { "BTC moon" } else { "BTC dump" }))
        .collect()
}

fn every_minute() -> MonitorConfig {
    let mut cfg = MonitorConfig::with_topics(&["BTC"]);
    cfg.interval = Duration::from_secs(60);
    cfg
}

#[tokio::test(start_paused = true)]
async fn run_cycles_on_each_tick_until_shutdown() {
    let (mut m, feed, notifier) = monitor(every_minute(), &["whale"]);
    feed.push("whale", hot_batch());
    let board = m.status_board();

    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        m.run(async {
            let _ = rx.await;
        })
        .await;
        m
    });

    // Ticks at 0s, 60s and 120s.
    tokio::time::sleep(Duration::from_secs(150)).await;
    tx.send(()).unwrap();
    let m = task.await.unwrap();

    assert_eq!(board.snapshot().cycles, 3);
    assert_eq!(feed.cursors_seen.lock().unwrap().len(), 3);
    assert_eq!(m.evaluate("BTC").sample_size, 10);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_cycle_keeps_committed_state() {
    let (mut m, feed, notifier) = monitor(every_minute(), &["whale", "stuck"]);
    feed.push("whale", hot_batch());
    feed.stall("stuck");
    let board = m.status_board();

    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        m.run(async {
            let _ = rx.await;
        })
        .await;
        m
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    tx.send(()).unwrap();
    let m = task.await.unwrap();

    // The first account was fully processed before the stall.
    let res = m.evaluate("BTC");
    assert_eq!((res.positive_count, res.sample_size), (8, 10));
    assert_eq!(notifier.count(), 1);
    // The cycle itself never finished.
    assert_eq!(board.snapshot().cycles, 0);
    let seen = feed.cursors_seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![("whale".to_string(), None), ("stuck".to_string(), None)]
    );
}

#[tokio::test(start_paused = true)]
async fn accounts_are_polled_in_paced_batches() {
    let accounts = ["a1", "a2", "a3", "a4", "a5", "a6"];
    let (mut m, feed, _) = monitor(MonitorConfig::with_topics(&["BTC"]), &accounts);

    let start = Instant::now();
    m.run_cycle().await;
    let elapsed = start.elapsed();

    // Five accounts, one 2s pause, then the sixth.
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    let polled: Vec<String> = feed
        .cursors_seen
        .lock()
        .unwrap()
        .iter()
        .map(|(a, _)| a.clone())
        .collect();
    assert_eq!(polled, accounts);
}

#[tokio::test(start_paused = true)]
async fn batch_size_and_pause_are_configurable() {
    let mut cfg = MonitorConfig::with_topics(&["BTC"]);
    cfg.poll_batch_size = 2;
    cfg.poll_batch_pause = Duration::from_millis(500);
    let (mut m, _, _) = monitor(cfg, &["a1", "a2", "a3", "a4", "a5"]);

    let start = Instant::now();
    m.run_cycle().await;
    // Pauses after the 2nd and 4th accounts only.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1000), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");

    let mut cfg = MonitorConfig::with_topics(&["BTC"]);
    cfg.poll_batch_size = 1;
    cfg.poll_batch_pause = Duration::ZERO;
    let (mut m, feed, _) = monitor(cfg, &["a1", "a2", "a3"]);
    let start = Instant::now();
    m.run_cycle().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(feed.cursors_seen.lock().unwrap().len(), 3);
}
