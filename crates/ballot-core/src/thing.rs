//! Records owned by the identity/content layer.
//!
//! The voting pipeline never writes these (except vote tallies, which the
//! vote store maintains as part of a commit). They are resolved from opaque
//! identifiers through [`crate::store::ContentLookup`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AccountId, CommunityId, TargetId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub account_id: AccountId,
  pub name:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
  pub community_id: CommunityId,
  pub name:         String,
}

/// A submitted link (or text post, when `url` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub link_id:      u64,
  pub author_id:    AccountId,
  pub community_id: CommunityId,
  pub url:          Option<String>,
  pub created_at:   DateTime<Utc>,
  pub ups:          i64,
  pub downs:        i64,
  pub spam:         bool,
  pub deleted:      bool,
}

impl Link {
  pub fn target_id(&self) -> TargetId { TargetId::link(self.link_id) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:   u64,
  pub link_id:      u64,
  pub author_id:    AccountId,
  pub community_id: CommunityId,
  pub created_at:   DateTime<Utc>,
  pub ups:          i64,
  pub downs:        i64,
  pub spam:         bool,
  pub deleted:      bool,
}

impl Comment {
  pub fn target_id(&self) -> TargetId { TargetId::comment(self.comment_id) }

  /// Total votes cast, used to throttle comment-tree recomputation.
  pub fn num_votes(&self) -> i64 { self.ups + self.downs }
}

/// Anything a vote can land on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
  Link(Link),
  Comment(Comment),
}

impl Target {
  pub fn target_id(&self) -> TargetId {
    match self {
      Self::Link(l) => l.target_id(),
      Self::Comment(c) => c.target_id(),
    }
  }

  pub fn author_id(&self) -> AccountId {
    match self {
      Self::Link(l) => l.author_id,
      Self::Comment(c) => c.author_id,
    }
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    match self {
      Self::Link(l) => l.created_at,
      Self::Comment(c) => c.created_at,
    }
  }

  /// `(ups, downs)` as currently tallied.
  pub fn tally(&self) -> (i64, i64) {
    match self {
      Self::Link(l) => (l.ups, l.downs),
      Self::Comment(c) => (c.ups, c.downs),
    }
  }

  /// Removed or suppressed things never fan out into listings.
  pub fn is_suppressed(&self) -> bool {
    match self {
      Self::Link(l) => l.spam || l.deleted,
      Self::Comment(c) => c.spam || c.deleted,
    }
  }
}
