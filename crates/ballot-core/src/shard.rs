//! Queue sharding for derived-listing updates.
//!
//! Listing updates take a lock per dimension instance (one author, one
//! community, one domain). Routing every update for a given instance to the
//! same queue shard means one consumer per shard never contends with
//! another for that lock.

use sha2::{Digest, Sha256};

/// Default number of shards per sharded queue family.
pub const DEFAULT_SHARD_COUNT: u32 = 10;

pub const AUTHOR_QUERY_QUEUE: &str = "author_query";
pub const COMMUNITY_QUERY_QUEUE: &str = "community_query";
pub const DOMAIN_QUERY_QUEUE: &str = "domain_query";

/// Name of the queue in family `prefix` that carries updates for `key`.
///
/// `author_query_3_q` when sharding is enabled, `author_query_q` otherwise.
/// A shard count of zero is treated as sharding disabled.
pub fn shard_for(prefix: &str, key: u64, shard_count: u32, enabled: bool) -> String {
  if enabled && shard_count > 0 {
    format!("{prefix}_{}_q", key % u64::from(shard_count))
  } else {
    unsharded(prefix)
  }
}

/// Name of shard `shard` of family `prefix`, or the single queue if `None`.
pub fn queue_name(prefix: &str, shard: Option<u32>) -> String {
  match shard {
    Some(n) => format!("{prefix}_{n}_q"),
    None => unsharded(prefix),
  }
}

fn unsharded(prefix: &str) -> String { format!("{prefix}_q") }

/// A hash of `s` that every process agrees on.
pub fn stable_hash(s: &str) -> u64 {
  let digest = Sha256::digest(s.as_bytes());
  let mut head = [0u8; 8];
  head.copy_from_slice(&digest[..8]);
  u64::from_be_bytes(head)
}
