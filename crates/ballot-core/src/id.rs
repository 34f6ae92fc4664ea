//! Opaque identifiers for accounts, communities and votable things.
//!
//! Things travel through queues as "fullnames": a kind tag and a numeric id
//! joined by a colon, e.g. `link:42`. The kind tag is what lets a consumer
//! reject a message that names the wrong kind of thing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

pub type AccountId = u64;
pub type CommunityId = u64;

/// The kind of thing an identifier points at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetKind {
  Link,
  Comment,
  Account,
  Community,
}

impl TargetKind {
  /// Only links and comments accept votes.
  pub fn is_votable(self) -> bool { matches!(self, Self::Link | Self::Comment) }
}

/// A kind-tagged identifier, rendered as `{kind}:{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
  pub kind: TargetKind,
  pub id:   u64,
}

impl TargetId {
  pub fn link(id: u64) -> Self { Self { kind: TargetKind::Link, id } }

  pub fn comment(id: u64) -> Self { Self { kind: TargetKind::Comment, id } }

  pub fn fullname(&self) -> String { self.to_string() }
}

impl fmt::Display for TargetId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.id)
  }
}

impl FromStr for TargetId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || Error::InvalidFullname(s.to_owned());
    let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
    Ok(Self {
      kind: kind.parse().map_err(|_| invalid())?,
      id:   id.parse().map_err(|_| invalid())?,
    })
  }
}

impl Serialize for TargetId {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for TargetId {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}
