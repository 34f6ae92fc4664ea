//! Lock namespaces and keys used by the pipeline.
//!
//! The locks themselves come from a [`ballot_core::cache::LockService`];
//! consumers sharing a store must share its lock service too.

use ballot_core::id::{AccountId, TargetId};

/// Namespace of the per-(actor, target) vote commit lock.
pub const VOTE_LOCK_NAMESPACE: &str = "voting";
/// Namespace of the per-dimension listing lock.
pub const LISTING_LOCK_NAMESPACE: &str = "listing";

pub fn vote_lock_key(actor_id: AccountId, target: TargetId) -> String {
  format!("vote-{actor_id}-{target}")
}
