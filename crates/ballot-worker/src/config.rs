//! Runtime worker configuration, deserialised from `ballot.toml` layered
//! with `BALLOT_*` environment variables.

use std::{path::PathBuf, time::Duration};

use ballot_core::shard::DEFAULT_SHARD_COUNT;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerConfig {
  pub store_path:                    PathBuf,
  /// How long a pending-vote marker stays visible before the durable vote
  /// is expected to have committed.
  pub vote_grace_period_secs:        u64,
  pub lock_timeout_secs:             u64,
  /// How long a lock outlives a worker that died while holding it.
  pub lock_lease_secs:               u64,
  pub shard_count:                   u32,
  pub shard_author_queues:           bool,
  pub shard_community_queues:        bool,
  pub shard_domain_queues:           bool,
  pub author_query_limit:            usize,
  pub community_query_limit:         usize,
  pub domain_query_limit:            usize,
  /// Comments with at most this many votes are re-sorted on every vote.
  pub comment_vote_update_threshold: i64,
  /// Comments past the threshold are re-sorted on every vote count that is a
  /// multiple of this. Zero turns that off.
  pub comment_vote_update_period:    i64,
  pub poll_interval_ms:              u64,
  /// Redelivery timeout for consumed but unacknowledged messages.
  pub queue_lease_secs:              u64,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      store_path:                    PathBuf::from("ballot.sqlite3"),
      vote_grace_period_secs:        3600,
      lock_timeout_secs:             5,
      lock_lease_secs:               30,
      shard_count:                   DEFAULT_SHARD_COUNT,
      shard_author_queues:           false,
      shard_community_queues:        false,
      shard_domain_queues:           false,
      author_query_limit:            1000,
      community_query_limit:         1000,
      domain_query_limit:            1000,
      comment_vote_update_threshold: 1000,
      comment_vote_update_period:    10,
      poll_interval_ms:              250,
      queue_lease_secs:              60,
    }
  }
}

impl WorkerConfig {
  pub fn grace_period(&self) -> Duration {
    Duration::from_secs(self.vote_grace_period_secs)
  }

  pub fn lock_timeout(&self) -> Duration {
    Duration::from_secs(self.lock_timeout_secs)
  }

  pub fn lock_lease(&self) -> Duration {
    Duration::from_secs(self.lock_lease_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn queue_lease(&self) -> Duration {
    Duration::from_secs(self.queue_lease_secs)
  }

  pub fn fanout(&self) -> FanoutConfig {
    FanoutConfig {
      shard_count:                   self.shard_count,
      shard_author_queues:           self.shard_author_queues,
      shard_community_queues:        self.shard_community_queues,
      shard_domain_queues:           self.shard_domain_queues,
      comment_vote_update_threshold: self.comment_vote_update_threshold,
      comment_vote_update_period:    self.comment_vote_update_period,
      lock_timeout:                  self.lock_timeout(),
    }
  }
}

/// The slice of [`WorkerConfig`] the fan-out dispatcher reads.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
  pub shard_count:                   u32,
  pub shard_author_queues:           bool,
  pub shard_community_queues:        bool,
  pub shard_domain_queues:           bool,
  pub comment_vote_update_threshold: i64,
  pub comment_vote_update_period:    i64,
  pub lock_timeout:                  Duration,
}

impl Default for FanoutConfig {
  fn default() -> Self { WorkerConfig::default().fanout() }
}

impl FanoutConfig {
  /// Whether a comment with `num_votes` votes should have its tree
  /// position recomputed now.
  pub fn should_recompute_comment(&self, num_votes: i64) -> bool {
    num_votes <= self.comment_vote_update_threshold
      || (self.comment_vote_update_period > 0
        && num_votes % self.comment_vote_update_period == 0)
  }
}
