//! Propagation of a committed vote into the derived listings.
//!
//! Link votes are fanned out as listing-update jobs on the author,
//! community and domain query queues. Comment votes update the comment
//! author's listings directly and, throttled by vote count, ask for the
//! comment tree to be re-sorted.

use std::sync::Arc;

use ballot_core::{
  cache::LockService,
  domain::domain_permutations,
  listing::{Dimension, ListingEntry, VOTE_SORTS},
  queue::{COMMENT_TREE_QUEUE, QueueTransport},
  shard::{
    AUTHOR_QUERY_QUEUE, COMMUNITY_QUERY_QUEUE, DOMAIN_QUERY_QUEUE, shard_for,
    stable_hash,
  },
  store::ListingStore,
  thing::{Comment, Link, Target},
};

use crate::{config::FanoutConfig, error::ConsumeError, listing::update_listings};

/// What a dispatch did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fanout {
  /// Query queues the target was enqueued on.
  pub queues:          Vec<String>,
  /// Whether the comment's author listings were updated.
  pub author_comments: bool,
  /// Whether a comment-tree recompute was requested.
  pub comment_tree:    bool,
}

pub struct FanoutDispatcher<S, L> {
  store:  Arc<S>,
  locks:  Arc<L>,
  config: FanoutConfig,
}

impl<S, L> FanoutDispatcher<S, L>
where
  S: ListingStore + QueueTransport,
  L: LockService,
{
  pub fn new(store: Arc<S>, locks: Arc<L>, config: FanoutConfig) -> Self {
    Self { store, locks, config }
  }

  /// The query queues a vote on `link` fans out to. A link without a usable
  /// domain has no domain queue.
  pub fn link_queues(&self, link: &Link) -> Vec<String> {
    let cfg = &self.config;
    let mut queues = vec![
      shard_for(
        AUTHOR_QUERY_QUEUE,
        link.author_id,
        cfg.shard_count,
        cfg.shard_author_queues,
      ),
      shard_for(
        COMMUNITY_QUERY_QUEUE,
        link.community_id,
        cfg.shard_count,
        cfg.shard_community_queues,
      ),
    ];

    let domains = link
      .url
      .as_deref()
      .map(domain_permutations)
      .unwrap_or_default();
    if let Some(primary) = domains.first() {
      queues.push(shard_for(
        DOMAIN_QUERY_QUEUE,
        stable_hash(primary),
        cfg.shard_count,
        cfg.shard_domain_queues,
      ));
    }
    queues
  }

  /// Fan out an eligible vote on `target`, using its post-commit state.
  pub async fn dispatch(&self, target: &Target) -> Result<Fanout, ConsumeError> {
    match target {
      Target::Link(link) => self.dispatch_link(link).await,
      Target::Comment(comment) => self.dispatch_comment(target, comment).await,
    }
  }

  async fn dispatch_link(&self, link: &Link) -> Result<Fanout, ConsumeError> {
    let payload = link.target_id().fullname();
    let queues = self.link_queues(link);
    for queue in &queues {
      self
        .store
        .enqueue(queue, &payload)
        .await
        .map_err(ConsumeError::queue)?;
    }
    Ok(Fanout { queues, ..Fanout::default() })
  }

  async fn dispatch_comment(
    &self,
    target: &Target,
    comment: &Comment,
  ) -> Result<Fanout, ConsumeError> {
    update_listings(
      self.store.as_ref(),
      self.locks.as_ref(),
      &Dimension::AuthorComments(comment.author_id),
      &VOTE_SORTS,
      self.config.lock_timeout,
      |sort, listing| listing.insert([ListingEntry::for_target(target, sort)]),
    )
    .await?;

    let comment_tree = self.config.should_recompute_comment(comment.num_votes());
    if comment_tree {
      self
        .store
        .enqueue(COMMENT_TREE_QUEUE, &comment.target_id().fullname())
        .await
        .map_err(ConsumeError::queue)?;
    }
    Ok(Fanout { author_comments: true, comment_tree, ..Fanout::default() })
  }
}
