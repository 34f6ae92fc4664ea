//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, except queue and cache deadlines, which
//! are epoch milliseconds so they can be compared in SQL. Ids are stored as
//! signed integers; fullnames as their `kind:id` text.

use chrono::{DateTime, Utc};
use ballot_core::{
  context::EventData,
  id::TargetId,
  thing::{Account, Comment, Community, Link},
  vote::{Direction, Vote, VoteData, VoteEffects},
};

use crate::{Error, Result};

// ─── Ids ─────────────────────────────────────────────────────────────────────

pub fn encode_id(id: u64) -> Result<i64> {
  i64::try_from(id).map_err(|_| Error::IdOutOfRange(id))
}

pub fn decode_id(raw: i64) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::NegativeId(raw))
}

pub fn encode_ids(ids: &[u64]) -> Result<Vec<i64>> {
  ids.iter().copied().map(encode_id).collect()
}

/// `?1, ?2, …, ?n` for an `IN (…)` clause.
pub fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn now_millis() -> i64 { Utc::now().timestamp_millis() }

// ─── Direction ───────────────────────────────────────────────────────────────

pub fn decode_direction(s: &str) -> Result<Direction> {
  Direction::parse(s).ok_or_else(|| Error::UnknownDirection(s.to_owned()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub struct RawAccount {
  pub account_id: i64,
  pub name:       String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account { account_id: decode_id(self.account_id)?, name: self.name })
  }
}

pub struct RawCommunity {
  pub community_id: i64,
  pub name:         String,
}

impl RawCommunity {
  pub fn into_community(self) -> Result<Community> {
    Ok(Community {
      community_id: decode_id(self.community_id)?,
      name:         self.name,
    })
  }
}

pub struct RawLink {
  pub link_id:      i64,
  pub author_id:    i64,
  pub community_id: i64,
  pub url:          Option<String>,
  pub created_at:   String,
  pub ups:          i64,
  pub downs:        i64,
  pub spam:         bool,
  pub deleted:      bool,
}

pub const LINK_COLUMNS: &str = "link_id, author_id, community_id, url, \
                                created_at, ups, downs, spam, deleted";

impl RawLink {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      link_id:      row.get(0)?,
      author_id:    row.get(1)?,
      community_id: row.get(2)?,
      url:          row.get(3)?,
      created_at:   row.get(4)?,
      ups:          row.get(5)?,
      downs:        row.get(6)?,
      spam:         row.get(7)?,
      deleted:      row.get(8)?,
    })
  }

  pub fn into_link(self) -> Result<Link> {
    Ok(Link {
      link_id:      decode_id(self.link_id)?,
      author_id:    decode_id(self.author_id)?,
      community_id: decode_id(self.community_id)?,
      url:          self.url,
      created_at:   decode_dt(&self.created_at)?,
      ups:          self.ups,
      downs:        self.downs,
      spam:         self.spam,
      deleted:      self.deleted,
    })
  }
}

pub struct RawComment {
  pub comment_id:   i64,
  pub link_id:      i64,
  pub author_id:    i64,
  pub community_id: i64,
  pub created_at:   String,
  pub ups:          i64,
  pub downs:        i64,
  pub spam:         bool,
  pub deleted:      bool,
}

pub const COMMENT_COLUMNS: &str = "comment_id, link_id, author_id, \
                                   community_id, created_at, ups, downs, \
                                   spam, deleted";

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:   row.get(0)?,
      link_id:      row.get(1)?,
      author_id:    row.get(2)?,
      community_id: row.get(3)?,
      created_at:   row.get(4)?,
      ups:          row.get(5)?,
      downs:        row.get(6)?,
      spam:         row.get(7)?,
      deleted:      row.get(8)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:   decode_id(self.comment_id)?,
      link_id:      decode_id(self.link_id)?,
      author_id:    decode_id(self.author_id)?,
      community_id: decode_id(self.community_id)?,
      created_at:   decode_dt(&self.created_at)?,
      ups:          self.ups,
      downs:        self.downs,
      spam:         self.spam,
      deleted:      self.deleted,
    })
  }
}

/// Raw strings read directly from a `votes` row.
pub struct RawVote {
  pub actor_id:           i64,
  pub target:             String,
  pub direction:          String,
  pub previous_direction: Option<String>,
  pub date:               String,
  pub data_json:          String,
  pub event_data_json:    Option<String>,
  pub fanout_pending:     bool,
}

impl RawVote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:           row.get(0)?,
      target:             row.get(1)?,
      direction:          row.get(2)?,
      previous_direction: row.get(3)?,
      date:               row.get(4)?,
      data_json:          row.get(5)?,
      event_data_json:    row.get(6)?,
      fanout_pending:     row.get(7)?,
    })
  }

  /// Rebuild a [`Vote`]. A vote with no previous direction was the actor's
  /// first on the target; it affected the score iff the direction changed.
  pub fn into_vote(self) -> Result<Vote> {
    let direction = decode_direction(&self.direction)?;
    let previous_direction = self
      .previous_direction
      .as_deref()
      .map(decode_direction)
      .transpose()?;
    let data: VoteData = serde_json::from_str(&self.data_json)?;
    let event_data: Option<EventData> = self
      .event_data_json
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Vote {
      actor_id: decode_id(self.actor_id)?,
      target: self.target.parse::<TargetId>()?,
      direction,
      previous_direction,
      date: decode_dt(&self.date)?,
      data,
      event_data,
      is_automatic_initial_vote: previous_direction.is_none(),
      effects: VoteEffects {
        affects_score: previous_direction.unwrap_or_default() != direction,
      },
      fanout_pending: self.fanout_pending,
    })
  }
}
