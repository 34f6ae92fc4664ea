//! Short-lived "pending vote" markers.
//!
//! Between submission and commit a vote lives only in the queue. The intent
//! marker lets a reader show the actor their own vote in the meantime. It is
//! best effort: cache failures are logged and otherwise ignored.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use ballot_core::{
  cache::Cache,
  id::{AccountId, TargetId, TargetKind},
  vote::Direction,
};

pub fn intent_key(actor_id: AccountId, target: TargetId) -> String {
  format!("queuedvote:{actor_id}_{target}")
}

/// Marker bumped whenever the actor's votes on `kind` change.
pub fn last_modified_key(actor_id: AccountId, kind: TargetKind) -> String {
  format!("last_modified:{actor_id}:liked_{kind}")
}

pub struct IntentRecorder<C> {
  cache:        Arc<C>,
  grace_period: Duration,
}

impl<C> Clone for IntentRecorder<C> {
  fn clone(&self) -> Self {
    Self { cache: self.cache.clone(), grace_period: self.grace_period }
  }
}

impl<C: Cache> IntentRecorder<C> {
  pub fn new(cache: Arc<C>, grace_period: Duration) -> Self {
    Self { cache, grace_period }
  }

  /// Markers outlive the grace period by a second, so a commit landing right
  /// at the deadline is never shadowed by a missing marker.
  pub fn ttl(&self) -> Duration { self.grace_period + Duration::from_secs(1) }

  pub async fn record_intent(
    &self,
    actor_id: AccountId,
    target: TargetId,
    direction: Direction,
  ) {
    let key = intent_key(actor_id, target);
    if let Err(e) = self
      .cache
      .set(&key, direction.as_str(), Some(self.ttl()))
      .await
    {
      tracing::warn!(%key, error = %e, "failed to record vote intent");
    }

    let key = last_modified_key(actor_id, target.kind);
    let now = Utc::now().to_rfc3339();
    if let Err(e) = self.cache.set(&key, &now, None).await {
      tracing::warn!(%key, error = %e, "failed to touch last-modified marker");
    }
  }

  /// The direction the actor most recently submitted on `target`, if its
  /// marker is still live.
  pub async fn pending_intent(
    &self,
    actor_id: AccountId,
    target: TargetId,
  ) -> Option<Direction> {
    let key = intent_key(actor_id, target);
    match self.cache.get(&key).await {
      Ok(value) => value.as_deref().and_then(Direction::parse),
      Err(e) => {
        tracing::warn!(%key, error = %e, "failed to read vote intent");
        None
      }
    }
  }

  pub async fn last_modified(
    &self,
    actor_id: AccountId,
    kind: TargetKind,
  ) -> Option<DateTime<Utc>> {
    let key = last_modified_key(actor_id, kind);
    let raw = self.cache.get(&key).await.ok().flatten()?;
    DateTime::parse_from_rfc3339(&raw)
      .ok()
      .map(|dt| dt.with_timezone(&Utc))
  }
}
