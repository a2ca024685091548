mod serve;

use crate::config::{Config, DEFAULT_DATA_DIR, DEFAULT_FLUSH_INTERVAL_SECS};
use crate::logging;
use crate::services::{query, AggregationCache, FileStatsStore, UsageMeter};
use crate::types::{QueryRequest, TrackRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Per-day usage metering for characters and groups
#[derive(Parser)]
#[command(name = "usage-meter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding one stats file per day
    #[arg(
        long,
        global = true,
        env = "USAGE_METER_DATA_DIR",
        default_value = DEFAULT_DATA_DIR
    )]
    data_dir: PathBuf,

    /// Seconds between periodic flushes
    #[arg(
        long,
        global = true,
        env = "USAGE_METER_FLUSH_SECS",
        default_value_t = DEFAULT_FLUSH_INTERVAL_SECS
    )]
    flush_interval_secs: u64,

    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive)
    #[arg(long, global = true, env = "USAGE_METER_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve newline-delimited JSON requests on stdin until EOF or Ctrl-C
    Serve,

    /// Record one increment for today and flush
    Track {
        /// Character or group id
        #[arg(long)]
        entity: String,

        /// Chat time in milliseconds
        #[arg(long)]
        time_ms: Option<u64>,

        /// Message count
        #[arg(long)]
        messages: Option<u64>,

        /// Word count
        #[arg(long)]
        words: Option<u64>,

        /// Attribute messages and words to the user
        #[arg(long, conflicts_with = "ai")]
        user: bool,

        /// Attribute messages and words to the AI
        #[arg(long)]
        ai: bool,
    },

    /// Print a day's totals as JSON (defaults to today)
    Query {
        /// Day in YYYY-MM-DD
        date: Option<String>,
    },

    /// List days that have stored stats
    Days,
}

impl Cli {
    fn config(&self) -> Config {
        Config::new(
            self.data_dir.clone(),
            Duration::from_secs(self.flush_interval_secs),
        )
    }

    pub async fn run(self) -> anyhow::Result<()> {
        logging::init(&self.log_level);
        let config = self.config();

        match self.command {
            Commands::Serve => serve::run(config).await,
            Commands::Track {
                entity,
                time_ms,
                messages,
                words,
                user,
                ai,
            } => {
                let is_user = match (user, ai) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                let request = TrackRequest {
                    entity_id: Some(entity),
                    time_increment_ms: time_ms.map(Into::into),
                    message_increment: messages.map(Into::into),
                    word_increment: words.map(Into::into),
                    is_user,
                };

                let meter = UsageMeter::start(config).await?;
                let tracked = meter.track(&request);
                let outcome = meter.stop().await;
                tracked?;
                if outcome.failed > 0 {
                    anyhow::bail!("failed to persist {} day(s)", outcome.failed);
                }
                Ok(())
            }
            Commands::Query { date } => {
                // No owner lock and no quarantine, so this is safe next to a running
                // server, but it cannot see that server's unflushed increments.
                let store = FileStatsStore::read_only(config.data_dir);
                let cache = AggregationCache::new(Box::new(store));
                let bucket = query::query(&cache, &QueryRequest { date })?;
                println!("{}", serde_json::to_string_pretty(&bucket)?);
                Ok(())
            }
            Commands::Days => {
                for day in FileStatsStore::read_only(config.data_dir).list_days() {
                    println!("{}", day);
                }
                Ok(())
            }
        }
    }
}
