//! ballot-worker binary.
//!
//! Reads `ballot.toml` (or the path given with `--config`) layered with
//! `BALLOT_*` environment variables, opens the SQLite store and runs one
//! consumer until Ctrl-C.
//!
//! ```text
//! ballot-worker link-votes
//! ballot-worker author-queries --shard 3
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use ballot_core::hooks::HookRegistry;
use ballot_store_sqlite::SqliteStore;
use ballot_worker::{
  WorkerConfig,
  commit::VoteConsumer,
  listing::{ListingConsumer, QueryFamily},
  runner::run_until_shutdown,
};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ballot vote pipeline worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ballot.toml")]
  config: PathBuf,

  #[command(subcommand)]
  consumer: ConsumerCmd,
}

#[derive(Subcommand)]
enum ConsumerCmd {
  /// Commit queued link votes.
  LinkVotes,
  /// Commit queued comment votes.
  CommentVotes,
  /// Update author listings.
  AuthorQueries {
    /// Shard to consume; omit for the unsharded queue.
    #[arg(long)]
    shard: Option<u32>,
  },
  /// Update community listings.
  CommunityQueries {
    #[arg(long)]
    shard: Option<u32>,
  },
  /// Update domain listings.
  DomainQueries {
    #[arg(long)]
    shard: Option<u32>,
  },
}

type Store = SqliteStore;

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
    .add_source(config::Environment::with_prefix("BALLOT"))
    .build()
    .context("failed to read config file")?;

  let worker_cfg: WorkerConfig = settings
    .try_deserialize()
    .context("failed to deserialise WorkerConfig")?;

  let store_path = expand_tilde(&worker_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_queue_lease(worker_cfg.queue_lease())
    .with_lock_lease(worker_cfg.lock_lease());

  // Locks live in the store file, so they exclude every worker sharing it.
  let store = Arc::new(store);
  let locks = store.clone();
  let hooks = Arc::new(HookRegistry::new());

  let (shutdown_tx, shutdown) = watch::channel(false);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!("shutdown requested");
      let _ = shutdown_tx.send(true);
    }
  });

  let interval = worker_cfg.poll_interval();
  match cli.consumer {
    ConsumerCmd::LinkVotes => {
      let consumer = VoteConsumer::links(store, locks, hooks, &worker_cfg);
      run_votes(&consumer, interval, shutdown).await;
    }
    ConsumerCmd::CommentVotes => {
      let consumer = VoteConsumer::comments(store, locks, hooks, &worker_cfg);
      run_votes(&consumer, interval, shutdown).await;
    }
    ConsumerCmd::AuthorQueries { shard } => {
      let consumer =
        ListingConsumer::new(QueryFamily::Author, shard, store, locks, &worker_cfg);
      run_listings(&consumer, interval, shutdown).await;
    }
    ConsumerCmd::CommunityQueries { shard } => {
      let consumer =
        ListingConsumer::new(QueryFamily::Community, shard, store, locks, &worker_cfg);
      run_listings(&consumer, interval, shutdown).await;
    }
    ConsumerCmd::DomainQueries { shard } => {
      let consumer =
        ListingConsumer::new(QueryFamily::Domain, shard, store, locks, &worker_cfg);
      run_listings(&consumer, interval, shutdown).await;
    }
  }

  Ok(())
}

async fn run_votes(
  consumer: &VoteConsumer<Store, Store>,
  interval: Duration,
  shutdown: watch::Receiver<bool>,
) {
  run_until_shutdown(consumer.queue(), interval, shutdown, move || async move {
    consumer
      .poll_one()
      .await
      .map(|handled| handled.is_some_and(|h| h.made_progress()))
  })
  .await;
}

async fn run_listings(
  consumer: &ListingConsumer<Store, Store>,
  interval: Duration,
  shutdown: watch::Receiver<bool>,
) {
  run_until_shutdown(consumer.queue(), interval, shutdown, move || async move {
    consumer
      .poll_batch()
      .await
      .map(|report| report.is_some_and(|r| r.made_progress()))
  })
  .await;
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
