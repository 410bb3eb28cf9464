//! `granary` — batch loader for the Granary dimensional warehouse.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite store, and runs one of the subcommands:
//!
//! ```
//! granary run --feed feed.jsonl --effective-date 2024-03-01
//! granary init-calendar --from 2024-01-01 --to 2025-12-31
//! granary history --dimension product --natural-key P1
//! ```
//!
//! The feed file is JSON lines, one tagged record per line; blank lines are
//! ignored.

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use granary_core::{
  feed::{FeedRecord, SourceBatch},
  store::WarehouseStore as _,
};
use granary_engine::{Engine, EngineConfig};
use granary_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Granary warehouse batch loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one load batch from a JSON-lines feed file.
  Run {
    /// Feed file, one tagged JSON record per line.
    #[arg(long)]
    feed: PathBuf,

    /// Effective date for dimension changes in this batch.
    #[arg(long)]
    effective_date: NaiveDate,
  },

  /// Populate the date dimension for an inclusive date range.
  InitCalendar {
    #[arg(long)]
    from: NaiveDate,

    #[arg(long)]
    to: NaiveDate,
  },

  /// Print the full version history for one natural key.
  History {
    #[arg(long)]
    dimension: String,

    #[arg(long)]
    natural_key: String,
  },
}

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_store_path() -> String { "granary.sqlite".to_owned() }

/// Shape of the TOML configuration file; every key can also be supplied via
/// the `GRANARY_` environment prefix.
#[derive(Debug, Deserialize)]
struct Settings {
  #[serde(default = "default_store_path")]
  store_path: String,

  /// Overrides the engine's bounded retry count for version conflicts.
  max_conflict_retries: Option<u32>,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GRANARY"))
    .build()
    .context("failed to read config file")?;

  let settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise Settings")?;

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {}", settings.store_path))?;

  let mut engine_config = EngineConfig::default();
  if let Some(retries) = settings.max_conflict_retries {
    engine_config.max_conflict_retries = retries;
  }
  let engine = Engine::new(store, engine_config);

  match cli.command {
    Command::Run { feed, effective_date } => {
      let batch = read_feed(&feed)?;
      anyhow::ensure!(!batch.is_empty(), "feed {} is empty", feed.display());

      let report = engine
        .run_batch(&batch, effective_date)
        .await
        .context("batch failed")?;

      println!("{}", serde_json::to_string_pretty(&report)?);
      if !report.rejected.is_empty() {
        anyhow::bail!("{} row(s) rejected", report.rejected.len());
      }
    }

    Command::InitCalendar { from, to } => {
      anyhow::ensure!(from <= to, "--from must not be after --to");
      let inserted = engine
        .store()
        .ensure_calendar(from, to)
        .await
        .context("calendar population failed")?;
      println!("inserted {inserted} calendar row(s)");
    }

    Command::History { dimension, natural_key } => {
      let history = engine
        .store()
        .versions(&dimension, &natural_key)
        .await
        .context("history query failed")?;
      anyhow::ensure!(
        !history.is_empty(),
        "no versions recorded for {dimension}/{natural_key}"
      );

      for version in history {
        let valid_to = version
          .valid_to
          .map_or_else(|| "open".to_owned(), |d| d.to_string());
        let marker = if version.is_current { "*" } else { " " };
        println!(
          "{marker} sk={} {} .. {} {}",
          version.surrogate_key,
          version.valid_from,
          valid_to,
          serde_json::to_string(&version.payload)?,
        );
      }
    }
  }

  Ok(())
}

/// Parse a JSON-lines feed file into a batch, with the offending line
/// number in any parse error.
fn read_feed(path: &PathBuf) -> anyhow::Result<SourceBatch> {
  let contents = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read feed {}", path.display()))?;

  let mut records = Vec::new();
  for (idx, line) in contents.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    let record: FeedRecord = serde_json::from_str(line)
      .with_context(|| format!("invalid feed record on line {}", idx + 1))?;
    records.push(record);
  }

  Ok(records.into_iter().collect())
}
