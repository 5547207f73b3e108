use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sentiment-monitor",
    version,
    about = "Watch crypto accounts, track per-topic sentiment and alert on positive spikes"
)]
pub struct Cli {
    /// TOML settings file (env vars still override it).
    #[arg(short, long, global = true, env = "MONITOR_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the monitoring loop until Ctrl-C (default).
    Start {
        /// Run one cycle and exit.
        #[arg(long)]
        once: bool,
    },
    /// Fetch the latest posts for one account and print them.
    TestFeed {
        #[arg(default_value = "elonmusk")]
        account: String,
    },
    /// Classify a piece of text.
    TestClassify {
        #[arg(default_value = "Bitcoin is going to the moon! Best investment ever!")]
        text: String,
    },
    /// Check the persistent store and print a topic's trend.
    TestStore {
        #[arg(default_value = "BTC")]
        topic: String,
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    /// Send a test notification through the configured channels.
    TestNotify {
        #[arg(default_value = "Test notification from the sentiment monitor")]
        message: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Start { once: false })
    }
}
