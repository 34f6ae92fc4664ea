//! The durable queue transport.
//!
//! Delivery is at least once. A consumer receives a [`Delivery`] and must
//! either [`ack`](QueueTransport::ack) it (done, never redelivered) or
//! [`nack`](QueueTransport::nack) it (redeliver). A delivery that is neither
//! becomes visible again once its lease runs out.

use std::future::Future;

use uuid::Uuid;

use crate::id::TargetKind;

/// Vote queue for links.
pub const LINK_VOTE_QUEUE: &str = "vote_link_q";
/// Vote queue for comments.
pub const COMMENT_VOTE_QUEUE: &str = "vote_comment_q";
/// Comments whose tree position needs recomputing.
pub const COMMENT_TREE_QUEUE: &str = "commentstree_q";

/// The vote queue for targets of `kind`, if that kind accepts votes.
pub fn vote_queue(kind: TargetKind) -> Option<&'static str> {
  match kind {
    TargetKind::Link => Some(LINK_VOTE_QUEUE),
    TargetKind::Comment => Some(COMMENT_VOTE_QUEUE),
    TargetKind::Account | TargetKind::Community => None,
  }
}

/// One leased message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  pub queue:      String,
  pub message_id: i64,
  /// Identifies this lease; acks carrying a stale lease are ignored.
  pub lease:      Uuid,
  pub body:       String,
  /// 1 on first delivery.
  pub attempts:   u32,
}

pub trait QueueTransport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Durably append `payload` to `queue`. Returns once the queue accepts it.
  fn enqueue<'a>(
    &'a self,
    queue: &'a str,
    payload: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Lease the oldest visible message, if any. Does not block.
  fn consume_one<'a>(
    &'a self,
    queue: &'a str,
  ) -> impl Future<Output = Result<Option<Delivery>, Self::Error>> + Send + 'a;

  /// Lease up to `limit` visible messages, oldest first. Does not block.
  fn consume_batch<'a>(
    &'a self,
    queue: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Delivery>, Self::Error>> + Send + 'a;

  fn ack<'a>(
    &'a self,
    delivery: &'a Delivery,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Release the lease so the message is redelivered.
  fn nack<'a>(
    &'a self,
    delivery: &'a Delivery,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
