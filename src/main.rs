//! Crypto Sentiment Monitor: binary entrypoint.
//! Loads settings, wires collaborators into the monitor, serves the status
//! surface and runs the loop until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_sentiment_monitor::bootstrap::{self, Runtime};
use crypto_sentiment_monitor::cli::{Cli, Command};
use crypto_sentiment_monitor::config::Settings;
use crypto_sentiment_monitor::ingest::accounts::load_accounts;
use crypto_sentiment_monitor::metrics::Metrics;
use crypto_sentiment_monitor::monitor::Monitor;
use crypto_sentiment_monitor::notify::Notification;
use crypto_sentiment_monitor::{api, normalize_text};

/// `LOG_FORMAT=json` switches to JSON lines; RUST_LOG wins over `--debug`.
fn init_tracing(debug: bool) {
    let default = if debug {
        "crypto_sentiment_monitor=debug,monitor=debug,notify=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    match cli.command() {
        Command::Start { once } => start(settings, once).await,
        Command::TestFeed { account } => test_feed(&settings, &account).await,
        Command::TestClassify { text } => test_classify(&settings, &text).await,
        Command::TestStore { topic, hours } => test_store(&settings, &topic, hours).await,
        Command::TestNotify { message } => test_notify(&settings, &message).await,
    }
}

async fn start(settings: Settings, once: bool) -> Result<()> {
    let cfg = settings.monitor_config().context("invalid monitor settings")?;
    let accounts = load_accounts(&settings.accounts_file)?;
    info!(
        accounts = accounts.len(),
        topics = ?cfg.topics,
        window = cfg.window_size,
        threshold = cfg.alert_threshold,
        "settings loaded"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed");
            None
        }
    };

    let rt = Runtime::from_settings(&settings)?;
    if let Err(e) = rt.store.ensure_schema().await {
        warn!(store = rt.store.name(), error = %e, "schema check failed; continuing");
    }

    let mut monitor = Monitor::new(cfg, accounts, rt.feed, rt.classifier, rt.notifier)
        .with_store(Arc::clone(&rt.store));
    let loaded = monitor.hydrate().await;
    info!(loaded, "windows hydrated");

    if let Some(addr) = settings.status_addr.as_deref() {
        let mut router = api::router(monitor.status_board());
        if let Some(m) = &metrics {
            router = router.merge(m.router());
        }
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding status server on {addr}"))?;
        info!(%addr, "status server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "status server stopped");
            }
        });
    }

    if once {
        let report = monitor.run_cycle().await;
        info!(?report, "single cycle finished");
        return Ok(());
    }

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "ctrl-c handler failed");
                std::future::pending::<()>().await;
            }
            info!("ctrl-c received; shutting down");
        })
        .await;
    Ok(())
}

async fn test_feed(settings: &Settings, account: &str) -> Result<()> {
    let feed = bootstrap::build_feed(settings)?;
    let posts = feed.fetch_new_posts(account, None).await?;
    println!("{} posts from @{account} via {}", posts.len(), feed.name());
    for p in posts.iter().take(5) {
        println!("- [{}] {}", p.id, normalize_text(&p.text));
    }
    Ok(())
}

async fn test_classify(settings: &Settings, text: &str) -> Result<()> {
    let classifier = bootstrap::build_classifier(settings)?;
    let label = classifier.classify(&normalize_text(text)).await?;
    println!("{label}: {text}");
    Ok(())
}

async fn test_store(settings: &Settings, topic: &str, hours: u32) -> Result<()> {
    let store = bootstrap::build_store(settings)?;
    store.ensure_schema().await?;
    let trend = store.sentiment_trends(topic, hours).await?;
    println!(
        "{} over {}h: total={} positive={} neutral={} negative={}",
        topic.to_uppercase(),
        trend.timeframe_hours,
        trend.total,
        trend.positive,
        trend.neutral,
        trend.negative
    );
    Ok(())
}

async fn test_notify(settings: &Settings, message: &str) -> Result<()> {
    let mux = bootstrap::build_notifier(settings)?;
    let delivery = mux.notify(&Notification::text(message)).await;
    println!("{:?} via {:?}", delivery, mux.channel_names());
    if !delivery.is_delivered() {
        anyhow::bail!("test notification was not delivered");
    }
    Ok(())
}
