//! Votes: the queued message, the consumer's input, and the committed record.
//!
//! A [`VoteMessage`] is produced once by the submitter and may be delivered
//! more than once. The consumer turns it into a [`NewVote`], which the vote
//! store commits into a [`Vote`]. Committing the same message twice leaves
//! the same final state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  context::EventData,
  id::{AccountId, TargetId, TargetKind},
  thing::{Account, Target},
};

/// Free-form extension data attached to a vote (`ip`, `org`, hook output).
pub type VoteData = serde_json::Map<String, serde_json::Value>;

// ─── Direction ───────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
  /// A retracted vote.
  #[default]
  None,
}

impl Direction {
  /// The form stored in the intent cache and in the `direction` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Up => "up",
      Self::Down => "down",
      Self::None => "none",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "up" => Some(Self::Up),
      "down" => Some(Self::Down),
      "none" => Some(Self::None),
      _ => None,
    }
  }

  /// Contribution to `(ups, downs)`.
  pub fn tally(self) -> (i64, i64) {
    match self {
      Self::Up => (1, 0),
      Self::Down => (0, 1),
      Self::None => (0, 0),
    }
  }

  pub fn is_upvote(self) -> bool { self == Self::Up }

  pub fn is_downvote(self) -> bool { self == Self::Down }
}

// ─── Queue payload ───────────────────────────────────────────────────────────

/// The durable queue payload. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteMessage {
  pub user_id:        AccountId,
  pub thing_fullname: TargetId,
  pub direction:      Direction,
  /// Submission time, epoch seconds.
  #[serde(with = "chrono::serde::ts_seconds")]
  pub date:           DateTime<Utc>,
  #[serde(default)]
  pub data:           VoteData,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_data:     Option<EventData>,
}

impl VoteMessage {
  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

  pub fn from_value(value: serde_json::Value) -> Result<Self> {
    Ok(serde_json::from_value(value)?)
  }
}

// ─── NewVote ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::VoteStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewVote {
  pub actor_id:   AccountId,
  pub target:     TargetId,
  pub direction:  Direction,
  pub date:       DateTime<Utc>,
  pub data:       VoteData,
  pub event_data: Option<EventData>,
}

impl NewVote {
  /// Build a vote by `actor` on `target` from a dequeued message.
  ///
  /// Fails when the target is of a kind this consumer does not handle. A
  /// message naming a non-votable kind never gets this far: it cannot be
  /// resolved to a [`Target`] at all.
  pub fn from_message(
    actor: &Account,
    target: &Target,
    expected: TargetKind,
    message: VoteMessage,
  ) -> Result<Self> {
    let target_id = target.target_id();
    if target_id.kind != expected {
      return Err(Error::KindMismatch { target: target_id, expected });
    }
    Ok(Self {
      actor_id:   actor.account_id,
      target:     target_id,
      direction:  message.direction,
      date:       message.date,
      data:       message.data,
      event_data: message.event_data,
    })
  }
}

// ─── Vote ────────────────────────────────────────────────────────────────────

/// The store's judgement of what a commit did to the target's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteEffects {
  pub affects_score: bool,
}

/// The authoritative vote of one actor on one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
  pub actor_id:                  AccountId,
  pub target:                    TargetId,
  pub direction:                 Direction,
  /// Direction of the vote this one replaced, if any.
  pub previous_direction:        Option<Direction>,
  pub date:                      DateTime<Utc>,
  pub data:                      VoteData,
  pub event_data:                Option<EventData>,
  /// No earlier vote by this actor on this target existed.
  pub is_automatic_initial_vote: bool,
  pub effects:                   VoteEffects,
  /// An earlier commit of this vote was eligible for fan-out, and fan-out
  /// has not been settled since. Set until
  /// [`crate::store::VoteStore::settle_fanout`] clears it.
  pub fanout_pending:            bool,
}

impl Vote {
  /// Whether the commit should propagate into derived listings, before
  /// considering the target's own state.
  pub fn warrants_fanout(&self) -> bool {
    self.is_automatic_initial_vote || self.effects.affects_score || self.fanout_pending
  }
}
