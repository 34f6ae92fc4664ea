//! The vote commit consumer: one per votable kind.
//!
//! Each delivery is validated, resolved, committed under the
//! `(actor, target)` lock together with the actor's liked/disliked update,
//! and then fanned out. Deliveries that can never succeed are acknowledged
//! and dropped; infrastructure failures release them for redelivery.
//!
//! Fan-out eligibility is kept by the vote store until fan-out is settled,
//! so a delivery released after its commit still fans out on redelivery.

use std::{sync::Arc, time::Duration};

use ballot_core::{
  Error as CoreError,
  cache::LockService,
  hooks::{HookRegistry, ValidateArgs},
  id::{AccountId, TargetKind},
  listing::{Dimension, ListingEntry, Sort},
  queue::{COMMENT_VOTE_QUEUE, Delivery, LINK_VOTE_QUEUE, QueueTransport},
  store::{ContentLookup, ListingStore, VoteStore},
  thing::Target,
  vote::{Direction, NewVote, Vote, VoteMessage},
};

use crate::{
  config::WorkerConfig,
  error::ConsumeError,
  fanout::{Fanout, FanoutDispatcher},
  listing::update_listings,
  lock::{VOTE_LOCK_NAMESPACE, vote_lock_key},
  timer::{PhaseTimer, Timings},
};

/// The listing a vote in `direction` puts its target in, if any.
pub fn likes_dimension(actor_id: AccountId, direction: Direction) -> Option<Dimension> {
  match direction {
    Direction::Up => Some(Dimension::Liked(actor_id)),
    Direction::Down => Some(Dimension::Disliked(actor_id)),
    Direction::None => None,
  }
}

/// Liked/disliked listings are ordered by vote time.
const LIKES_SORTS: [Sort; 1] = [Sort::New];

#[derive(Debug)]
pub enum Outcome {
  Committed {
    vote:   Vote,
    /// `None` when the vote was not eligible for fan-out.
    fanout: Option<Fanout>,
  },
  /// Acknowledged without effect.
  Dropped(ConsumeError),
  /// Released for redelivery.
  Retried(ConsumeError),
}

/// The result of handling one delivery.
#[derive(Debug)]
pub struct Handled {
  pub outcome: Outcome,
  pub timings: Timings,
}

impl Handled {
  /// Whether the delivery left the queue. A released delivery is visible
  /// again at once, so polling straight away would spin on it.
  pub fn made_progress(&self) -> bool {
    !matches!(self.outcome, Outcome::Retried(_))
  }
}

pub struct VoteConsumer<S, L> {
  kind:         TargetKind,
  queue:        &'static str,
  store:        Arc<S>,
  locks:        Arc<L>,
  hooks:        Arc<HookRegistry>,
  lock_timeout: Duration,
  fanout:       FanoutDispatcher<S, L>,
}

impl<S, L> VoteConsumer<S, L>
where
  S: ContentLookup + VoteStore + ListingStore + QueueTransport,
  L: LockService,
{
  pub fn links(
    store: Arc<S>,
    locks: Arc<L>,
    hooks: Arc<HookRegistry>,
    config: &WorkerConfig,
  ) -> Self {
    Self::new(TargetKind::Link, LINK_VOTE_QUEUE, store, locks, hooks, config)
  }

  pub fn comments(
    store: Arc<S>,
    locks: Arc<L>,
    hooks: Arc<HookRegistry>,
    config: &WorkerConfig,
  ) -> Self {
    Self::new(TargetKind::Comment, COMMENT_VOTE_QUEUE, store, locks, hooks, config)
  }

  fn new(
    kind: TargetKind,
    queue: &'static str,
    store: Arc<S>,
    locks: Arc<L>,
    hooks: Arc<HookRegistry>,
    config: &WorkerConfig,
  ) -> Self {
    Self {
      kind,
      queue,
      fanout: FanoutDispatcher::new(store.clone(), locks.clone(), config.fanout()),
      store,
      locks,
      hooks,
      lock_timeout: config.lock_timeout(),
    }
  }

  pub fn queue(&self) -> &str { self.queue }

  /// Consume and handle at most one delivery. `None` when the queue had
  /// nothing visible.
  pub async fn poll_one(&self) -> Result<Option<Handled>, ConsumeError> {
    let delivery = self
      .store
      .consume_one(self.queue)
      .await
      .map_err(ConsumeError::queue)?;
    match delivery {
      Some(delivery) => Ok(Some(self.handle(&delivery).await?)),
      None => Ok(None),
    }
  }

  /// Process `delivery`, then ack or nack it.
  ///
  /// Only a failure to ack or nack is returned as an error.
  pub async fn handle(&self, delivery: &Delivery) -> Result<Handled, ConsumeError> {
    let mut timer = PhaseTimer::start(self.queue);
    let result = self.process(delivery, &mut timer).await;
    let timings = timer.finish();

    let outcome = match result {
      Ok((vote, fanout)) => {
        self.store.ack(delivery).await.map_err(ConsumeError::queue)?;
        Outcome::Committed { vote, fanout }
      }
      Err(e) if e.is_retryable() => {
        tracing::warn!(
          queue = self.queue,
          message_id = delivery.message_id,
          attempts = delivery.attempts,
          error = %e,
          "vote not committed, releasing for redelivery"
        );
        self.store.nack(delivery).await.map_err(ConsumeError::queue)?;
        Outcome::Retried(e)
      }
      Err(e) => {
        tracing::warn!(
          queue = self.queue,
          message_id = delivery.message_id,
          error = %e,
          "dropping vote message"
        );
        self.store.ack(delivery).await.map_err(ConsumeError::queue)?;
        Outcome::Dropped(e)
      }
    };
    Ok(Handled { outcome, timings })
  }

  async fn process(
    &self,
    delivery: &Delivery,
    timer: &mut PhaseTimer,
  ) -> Result<(Vote, Option<Fanout>), ConsumeError> {
    let message = self.parse(delivery)?;
    let target_id = message.thing_fullname;
    if !target_id.kind.is_votable() {
      return Err(ConsumeError::IncompatibleType(CoreError::NotVotable(target_id)));
    }

    let actor = self
      .store
      .account(message.user_id)
      .await
      .map_err(ConsumeError::storage)?
      .ok_or(ConsumeError::UnknownActor(message.user_id))?;
    let target = self
      .store
      .target(target_id)
      .await
      .map_err(ConsumeError::storage)?
      .ok_or(ConsumeError::UnknownTarget(target_id))?;

    let vote = {
      let _guard = self
        .locks
        .acquire(
          VOTE_LOCK_NAMESPACE,
          &vote_lock_key(actor.account_id, target_id),
          self.lock_timeout,
        )
        .await
        .map_err(ConsumeError::lock)?;

      let new_vote = NewVote::from_message(&actor, &target, self.kind, message)
        .map_err(ConsumeError::IncompatibleType)?;
      let vote = self
        .store
        .commit(new_vote)
        .await
        .map_err(ConsumeError::storage)?;
      timer.mark("create_vote_object");

      self.update_voter_likes(&vote).await?;
      timer.mark("voter_likes");
      vote
    };

    tracing::debug!(
      actor = vote.actor_id,
      target = %vote.target,
      direction = vote.direction.as_str(),
      initial = vote.is_automatic_initial_vote,
      affects_score = vote.effects.affects_score,
      fanout_pending = vote.fanout_pending,
      "vote committed"
    );

    let fanout = if vote.warrants_fanout() {
      let fanout = if target.is_suppressed() {
        None
      } else {
        Some(self.fan_out(target).await?)
      };
      self
        .store
        .settle_fanout(&vote)
        .await
        .map_err(ConsumeError::storage)?;
      fanout
    } else {
      None
    };
    timer.mark("author_queries");

    Ok((vote, fanout))
  }

  fn parse(&self, delivery: &Delivery) -> Result<VoteMessage, ConsumeError> {
    let value: serde_json::Value = serde_json::from_str(&delivery.body)
      .map_err(|e| ConsumeError::Malformed(e.to_string()))?;

    let verdict = self.hooks.validate_vote_data(&ValidateArgs {
      vote_data: &value,
      queue:     &delivery.queue,
      attempts:  delivery.attempts,
    });
    if verdict == Some(false) {
      return Err(ConsumeError::Rejected);
    }

    VoteMessage::from_value(value).map_err(|e| ConsumeError::Malformed(e.to_string()))
  }

  /// Move the target out of the listing of the direction it replaced and
  /// into the listing of its new direction.
  async fn update_voter_likes(&self, vote: &Vote) -> Result<(), ConsumeError> {
    let previous = vote
      .previous_direction
      .and_then(|d| likes_dimension(vote.actor_id, d));
    let current = likes_dimension(vote.actor_id, vote.direction);

    if let Some(dimension) = &previous {
      let target = vote.target;
      update_listings(
        self.store.as_ref(),
        self.locks.as_ref(),
        dimension,
        &LIKES_SORTS,
        self.lock_timeout,
        |_, listing| listing.remove(&[target]),
      )
      .await?;
    }
    if let Some(dimension) = &current {
      let entry = ListingEntry::for_vote(vote);
      update_listings(
        self.store.as_ref(),
        self.locks.as_ref(),
        dimension,
        &LIKES_SORTS,
        self.lock_timeout,
        |_, listing| listing.insert([entry]),
      )
      .await?;
    }
    Ok(())
  }

  /// Fan out using the target's post-commit tally. A failure leaves the
  /// vote's fan-out pending, and the delivery is retried.
  async fn fan_out(&self, committed: Target) -> Result<Fanout, ConsumeError> {
    let target = match self.store.target(committed.target_id()).await {
      Ok(Some(fresh)) => fresh,
      Ok(None) => committed,
      Err(e) => {
        tracing::warn!(error = %e, "failed to re-read target, using pre-commit state");
        committed
      }
    };

    self.fanout.dispatch(&target).await.inspect_err(|e| {
      tracing::error!(target = %target.target_id(), error = %e, "fan-out failed");
    })
  }
}
