//! Derived listings: precomputed, score-ordered lists of things.
//!
//! A listing is a cache, not a source of truth. It is mutated only by
//! read-modify-write under the lock of its dimension (see
//! [`Dimension::lock_key`]) and can be rebuilt from votes and things if lost.

use serde::{Deserialize, Serialize};

use crate::{
  id::{AccountId, CommunityId, TargetId},
  thing::Target,
  vote::Vote,
};

/// Listings never grow past this many entries; the lowest scores fall off.
pub const MAX_LISTING_LEN: usize = 1000;

/// Seconds between the Unix epoch and the start of the "hot" time scale.
const HOT_EPOCH_OFFSET: i64 = 1_134_028_003;

// ─── Sort ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sort {
  Hot,
  Top,
  Controversial,
  New,
}

/// Sorts whose order a vote can change. `New` is fixed at submission time.
pub const VOTE_SORTS: [Sort; 3] = [Sort::Hot, Sort::Top, Sort::Controversial];

impl Sort {
  /// The score of `target` under this sort, from its current tally.
  pub fn score(self, target: &Target) -> f64 {
    let (ups, downs) = target.tally();
    match self {
      Self::Hot => hot(ups, downs, target.created_at().timestamp()),
      Self::Top => (ups - downs) as f64,
      Self::Controversial => controversy(ups, downs),
      Self::New => target.created_at().timestamp() as f64,
    }
  }
}

fn hot(ups: i64, downs: i64, created_epoch: i64) -> f64 {
  let score = ups - downs;
  let order = (score.unsigned_abs().max(1) as f64).log10();
  let sign = score.signum() as f64;
  let seconds = (created_epoch - HOT_EPOCH_OFFSET) as f64;
  let raw = sign * order + seconds / 45_000.0;
  (raw * 1e7).round() / 1e7
}

fn controversy(ups: i64, downs: i64) -> f64 {
  if ups <= 0 || downs <= 0 {
    return 0.0;
  }
  let magnitude = (ups + downs) as f64;
  let balance = if ups > downs {
    downs as f64 / ups as f64
  } else {
    ups as f64 / downs as f64
  };
  magnitude.powf(balance)
}

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The thing a family of listings is "about".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Dimension {
  /// Links submitted by an account.
  Author(AccountId),
  /// Comments written by an account.
  AuthorComments(AccountId),
  Community(CommunityId),
  Domain(String),
  /// Things an account voted up.
  Liked(AccountId),
  /// Things an account voted down.
  Disliked(AccountId),
}

impl Dimension {
  fn path(&self) -> String {
    match self {
      Self::Author(id) => format!("author:{id}"),
      Self::AuthorComments(id) => format!("author_comments:{id}"),
      Self::Community(id) => format!("community:{id}"),
      Self::Domain(d) => format!("domain:{d}"),
      Self::Liked(id) => format!("liked:{id}"),
      Self::Disliked(id) => format!("disliked:{id}"),
    }
  }

  /// Lock key shared by every sort of this dimension instance.
  pub fn lock_key(&self) -> String { format!("listing-{}", self.path()) }

  pub fn key(&self, sort: Sort) -> ListingKey {
    ListingKey { dimension: self.clone(), sort }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingKey {
  pub dimension: Dimension,
  pub sort:      Sort,
}

impl ListingKey {
  /// Storage key, e.g. `listing:author:12:hot`.
  pub fn cache_key(&self) -> String {
    format!("listing:{}:{}", self.dimension.path(), self.sort)
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
  pub target: TargetId,
  pub score:  f64,
}

impl ListingEntry {
  pub fn for_target(target: &Target, sort: Sort) -> Self {
    Self { target: target.target_id(), score: sort.score(target) }
  }

  /// Entry for an account's liked/disliked listings, ordered by vote time.
  pub fn for_vote(vote: &Vote) -> Self {
    Self { target: vote.target, score: vote.date.timestamp() as f64 }
  }
}

/// Entries ordered by descending score, at most [`MAX_LISTING_LEN`] long,
/// each target at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
  entries: Vec<ListingEntry>,
}

impl Listing {
  pub fn entries(&self) -> &[ListingEntry] { &self.entries }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn contains(&self, target: TargetId) -> bool {
    self.entries.iter().any(|e| e.target == target)
  }

  /// Insert or re-score entries. Inserting a present target replaces it.
  pub fn insert(&mut self, entries: impl IntoIterator<Item = ListingEntry>) {
    for entry in entries {
      self.entries.retain(|e| e.target != entry.target);
      self.entries.push(entry);
    }
    self.entries.sort_by(|a, b| {
      b.score
        .total_cmp(&a.score)
        .then_with(|| b.target.cmp(&a.target))
    });
    self.entries.truncate(MAX_LISTING_LEN);
  }

  pub fn remove(&mut self, targets: &[TargetId]) {
    self.entries.retain(|e| !targets.contains(&e.target));
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::thing::Link;

  fn link(id: u64, ups: i64, downs: i64) -> Target {
    Target::Link(Link {
      link_id: id,
      author_id: 1,
      community_id: 1,
      url: None,
      created_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
      ups,
      downs,
      spam: false,
      deleted: false,
    })
  }

  #[test]
  fn insert_is_idempotent() {
    let mut listing = Listing::default();
    let t = link(1, 3, 0);
    listing.insert([ListingEntry::for_target(&t, Sort::Top)]);
    listing.insert([ListingEntry::for_target(&t, Sort::Top)]);
    assert_eq!(listing.len(), 1);
    assert!(listing.contains(TargetId::link(1)));
  }

  #[test]
  fn reinsert_rescores_and_reorders() {
    let mut listing = Listing::default();
    listing.insert([
      ListingEntry::for_target(&link(1, 5, 0), Sort::Top),
      ListingEntry::for_target(&link(2, 1, 0), Sort::Top),
    ]);
    assert_eq!(listing.entries()[0].target, TargetId::link(1));

    listing.insert([ListingEntry::for_target(&link(2, 9, 0), Sort::Top)]);
    assert_eq!(listing.entries()[0].target, TargetId::link(2));
    assert_eq!(listing.len(), 2);
  }

  #[test]
  fn listing_is_bounded() {
    let mut listing = Listing::default();
    listing.insert(
      (0..(MAX_LISTING_LEN as u64 + 10))
        .map(|i| ListingEntry { target: TargetId::link(i), score: i as f64 }),
    );
    assert_eq!(listing.len(), MAX_LISTING_LEN);
    // The lowest scores fell off.
    assert!(!listing.contains(TargetId::link(0)));
  }

  #[test]
  fn controversy_needs_both_directions() {
    assert_eq!(Sort::Controversial.score(&link(1, 10, 0)), 0.0);
    let even = Sort::Controversial.score(&link(1, 10, 10));
    let lopsided = Sort::Controversial.score(&link(1, 10, 2));
    assert!(even > lopsided);
  }

  #[test]
  fn hot_prefers_higher_score_at_equal_age() {
    assert!(Sort::Hot.score(&link(1, 100, 0)) > Sort::Hot.score(&link(2, 1, 0)));
    assert!(Sort::Hot.score(&link(1, 0, 100)) < Sort::Hot.score(&link(2, 1, 0)));
  }

  #[test]
  fn keys_are_distinct_per_dimension_and_sort() {
    let a = Dimension::Author(4).key(Sort::Hot).cache_key();
    let b = Dimension::Author(4).key(Sort::Top).cache_key();
    let c = Dimension::Community(4).key(Sort::Hot).cache_key();
    assert_eq!(a, "listing:author:4:hot");
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(
      Dimension::Author(4).lock_key(),
      Dimension::Author(4).lock_key()
    );
  }
}
