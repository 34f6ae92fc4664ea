//! Storage collaborators: content lookup, the authoritative vote store, and
//! the derived-listing store.
//!
//! The traits are implemented by storage backends (e.g.
//! `ballot-store-sqlite`). The worker depends on these abstractions, not on
//! any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used from tokio
//! worker tasks.

use std::{collections::HashMap, future::Future};

use crate::{
  id::{AccountId, CommunityId, TargetId},
  listing::{Listing, ListingKey},
  thing::{Account, Community, Link, Target},
  vote::{NewVote, Vote},
};

// ─── ContentLookup ───────────────────────────────────────────────────────────

/// Resolves opaque identifiers to identity/content records.
pub trait ContentLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn account(
    &self,
    id: AccountId,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Batch variant of [`ContentLookup::account`]. Unknown ids are absent
  /// from the map.
  fn accounts_by_id<'a>(
    &'a self,
    ids: &'a [AccountId],
  ) -> impl Future<Output = Result<HashMap<AccountId, Account>, Self::Error>>
  + Send
  + 'a;

  fn communities_by_id<'a>(
    &'a self,
    ids: &'a [CommunityId],
  ) -> impl Future<Output = Result<HashMap<CommunityId, Community>, Self::Error>>
  + Send
  + 'a;

  /// Resolve a votable thing. Returns `None` for unknown ids and for ids of
  /// kinds that cannot be voted on.
  fn target(
    &self,
    id: TargetId,
  ) -> impl Future<Output = Result<Option<Target>, Self::Error>> + Send + '_;

  /// Batch-resolve links. Unknown ids are skipped.
  fn links_by_id<'a>(
    &'a self,
    ids: &'a [u64],
  ) -> impl Future<Output = Result<Vec<Link>, Self::Error>> + Send + 'a;
}

// ─── VoteStore ───────────────────────────────────────────────────────────────

/// The authoritative record of votes, one per (actor, target).
pub trait VoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Upsert the vote of `input.actor_id` on `input.target`.
  ///
  /// The returned [`Vote`] carries the direction it replaced, whether it is
  /// the actor's first vote on the target, and whether it changed the
  /// target's score. Its fan-out stays pending, across redeliveries, until
  /// settled. Callers must hold the (actor, target) lock.
  fn commit(
    &self,
    input: NewVote,
  ) -> impl Future<Output = Result<Vote, Self::Error>> + Send + '_;

  fn get_vote(
    &self,
    actor_id: AccountId,
    target: TargetId,
  ) -> impl Future<Output = Result<Option<Vote>, Self::Error>> + Send + '_;

  /// Record that fan-out for `vote` has run (or was not needed), so later
  /// redeliveries of it do not fan out again.
  ///
  /// Has no effect once another commit has replaced `vote`; that commit
  /// carries its own pending mark.
  fn settle_fanout<'a>(
    &'a self,
    vote: &'a Vote,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── ListingStore ────────────────────────────────────────────────────────────

/// Cache-resident storage for derived listings.
///
/// Reads and writes are not atomic with respect to each other; callers
/// serialise read-modify-write cycles with the dimension lock.
pub trait ListingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` if the listing was never written or has been evicted.
  fn get_listing<'a>(
    &'a self,
    key: &'a ListingKey,
  ) -> impl Future<Output = Result<Option<Listing>, Self::Error>> + Send + 'a;

  fn put_listing<'a>(
    &'a self,
    key: &'a ListingKey,
    listing: &'a Listing,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
