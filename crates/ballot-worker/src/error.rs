//! Error types for the submission path and the queue consumers.

use thiserror::Error;

use ballot_core::id::{AccountId, TargetId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A vote could not be handed to the durable queue. The vote is lost unless
/// the caller retries, so this is always surfaced.
#[derive(Debug, Error)]
pub enum SubmitError {
  #[error("invalid vote: {0}")]
  Vote(#[from] ballot_core::Error),

  #[error("failed to enqueue vote on {queue}: {source}")]
  Enqueue {
    queue:  String,
    #[source]
    source: BoxError,
  },
}

/// Why a delivery could not be processed.
///
/// Retryable errors release the delivery for redelivery; the rest mean the
/// message can never succeed, and it is acknowledged and dropped.
#[derive(Debug, Error)]
pub enum ConsumeError {
  #[error("malformed message: {0}")]
  Malformed(String),

  #[error("message rejected by vote.validate_vote_data")]
  Rejected,

  #[error("incompatible target type: {0}")]
  IncompatibleType(#[source] ballot_core::Error),

  #[error("unknown account {0}")]
  UnknownActor(AccountId),

  #[error("unknown target {0}")]
  UnknownTarget(TargetId),

  #[error("lock error: {0}")]
  Lock(#[source] BoxError),

  #[error("storage error: {0}")]
  Storage(#[source] BoxError),

  #[error("queue error: {0}")]
  Queue(#[source] BoxError),
}

impl ConsumeError {
  pub fn lock(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Lock(Box::new(e))
  }

  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  pub fn queue(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Queue(Box::new(e))
  }

  /// Whether redelivering the message could succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Lock(_) | Self::Storage(_) | Self::Queue(_))
  }
}
