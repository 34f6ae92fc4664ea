//! Error types for `ballot-core`.

use thiserror::Error;

use crate::id::{TargetId, TargetKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid fullname: {0:?}")]
  InvalidFullname(String),

  #[error("{0} is not votable")]
  NotVotable(TargetId),

  #[error("{target} cannot be voted on through the {expected} vote queue")]
  KindMismatch {
    target:   TargetId,
    expected: TargetKind,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// A vote named a thing of a type that can never accept this vote.
  pub fn is_incompatible_type(&self) -> bool {
    matches!(self, Self::NotVotable(_) | Self::KindMismatch { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
