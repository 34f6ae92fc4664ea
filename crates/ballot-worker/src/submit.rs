//! The synchronous half of voting: record the intent, hand the vote to the
//! durable queue, return.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use ballot_core::{
  Error as CoreError,
  cache::Cache,
  context::{OrgResolver, RequestContext},
  hooks::{HookRegistry, VoteDataArgs},
  queue::{QueueTransport, vote_queue},
  thing::{Account, Target},
  vote::{Direction, VoteData, VoteMessage},
};

use crate::{error::SubmitError, intent::IntentRecorder};

pub struct VoteSubmitter<S, O> {
  store:   Arc<S>,
  intents: IntentRecorder<S>,
  orgs:    Arc<O>,
  hooks:   Arc<HookRegistry>,
}

impl<S, O> VoteSubmitter<S, O>
where
  S: Cache + QueueTransport,
  O: OrgResolver,
{
  pub fn new(
    store: Arc<S>,
    intents: IntentRecorder<S>,
    orgs: Arc<O>,
    hooks: Arc<HookRegistry>,
  ) -> Self {
    Self { store, intents, orgs, hooks }
  }

  /// Queue `actor`'s vote on `target`.
  ///
  /// Returns the enqueued message once the queue has accepted it. Nothing
  /// waits for the vote to be committed.
  pub async fn submit_vote(
    &self,
    actor: &Account,
    target: &Target,
    direction: Direction,
    extra_data: VoteData,
    request: &RequestContext,
  ) -> Result<VoteMessage, SubmitError> {
    let target_id = target.target_id();
    let queue = vote_queue(target_id.kind).ok_or(CoreError::NotVotable(target_id))?;

    // Before enqueueing, so a read right after this call sees the vote.
    self
      .intents
      .record_intent(actor.account_id, target_id, direction)
      .await;

    let mut data = extra_data;
    if let Some(ip) = request.ip {
      data.insert("ip".into(), Value::String(ip.to_string()));
      if let Some(org) = self.orgs.organization_for(ip).await {
        data.insert("org".into(), Value::String(org));
      }
    }

    self.hooks.call_get_vote_data(&mut VoteDataArgs {
      data: &mut data,
      actor,
      target,
      request,
    });

    let message = VoteMessage {
      user_id: actor.account_id,
      thing_fullname: target_id,
      direction,
      date: Utc::now(),
      data,
      event_data: request.event_data(),
    };
    let payload = message.to_json()?;

    self
      .store
      .enqueue(queue, &payload)
      .await
      .map_err(|e| SubmitError::Enqueue {
        queue:  queue.to_owned(),
        source: Box::new(e),
      })?;

    tracing::debug!(
      actor = actor.account_id,
      target = %target_id,
      direction = direction.as_str(),
      queue,
      "vote queued"
    );
    Ok(message)
  }
}

#[cfg(test)]
mod tests {
  use std::{net::IpAddr, time::Duration};

  use chrono::{TimeZone, Utc};
  use serde_json::json;

  use ballot_core::{
    context::{EventContext, NoOrgResolver},
    id::TargetId,
    queue::{COMMENT_VOTE_QUEUE, LINK_VOTE_QUEUE},
    thing::{Comment, Link},
  };
  use ballot_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::Flaky;

  struct FixedOrg;

  impl OrgResolver for FixedOrg {
    async fn organization_for(&self, _ip: IpAddr) -> Option<String> {
      Some("Example ISP".into())
    }
  }

  fn actor() -> Account { Account { account_id: 7, name: "alice".into() } }

  fn link() -> Target {
    Target::Link(Link {
      link_id:      3,
      author_id:    1,
      community_id: 2,
      url:          None,
      created_at:   Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
      ups:          0,
      downs:        0,
      spam:         false,
      deleted:      false,
    })
  }

  fn comment() -> Target {
    Target::Comment(Comment {
      comment_id:   4,
      link_id:      3,
      author_id:    1,
      community_id: 2,
      created_at:   Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
      ups:          0,
      downs:        0,
      spam:         false,
      deleted:      false,
    })
  }

  async fn submitter<O: OrgResolver>(
    orgs: O,
    hooks: HookRegistry,
  ) -> (Arc<SqliteStore>, VoteSubmitter<SqliteStore, O>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let intents = IntentRecorder::new(store.clone(), Duration::from_secs(60));
    let submitter =
      VoteSubmitter::new(store.clone(), intents, Arc::new(orgs), Arc::new(hooks));
    (store, submitter)
  }

  fn queued(bodies: &[String]) -> Vec<VoteMessage> {
    bodies
      .iter()
      .map(|b| VoteMessage::from_value(serde_json::from_str(b).unwrap()).unwrap())
      .collect()
  }

  #[tokio::test]
  async fn votes_land_on_their_kind_queue() {
    let (store, submitter) = submitter(NoOrgResolver, HookRegistry::new()).await;
    let ctx = RequestContext::script();

    submitter
      .submit_vote(&actor(), &link(), Direction::Up, VoteData::new(), &ctx)
      .await
      .unwrap();
    submitter
      .submit_vote(&actor(), &comment(), Direction::Down, VoteData::new(), &ctx)
      .await
      .unwrap();

    let links = queued(&store.peek_queue(LINK_VOTE_QUEUE).await.unwrap());
    let comments = queued(&store.peek_queue(COMMENT_VOTE_QUEUE).await.unwrap());
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].thing_fullname, TargetId::link(3));
    assert_eq!(links[0].direction, Direction::Up);
    assert_eq!(comments[0].thing_fullname, TargetId::comment(4));
    assert_eq!(comments[0].user_id, 7);
  }

  #[tokio::test]
  async fn intent_is_recorded_before_commit() {
    let (store, submitter) = submitter(NoOrgResolver, HookRegistry::new()).await;

    submitter
      .submit_vote(
        &actor(),
        &link(),
        Direction::Down,
        VoteData::new(),
        &RequestContext::script(),
      )
      .await
      .unwrap();

    let intents = IntentRecorder::new(store, Duration::from_secs(60));
    assert_eq!(
      intents.pending_intent(7, TargetId::link(3)).await,
      Some(Direction::Down)
    );
  }

  #[tokio::test]
  async fn request_attribution_and_hooks_enrich_data() {
    let mut hooks = HookRegistry::new();
    hooks.on_get_vote_data(|args| {
      let seen_ip = args.data.contains_key("ip");
      args.data.insert("hooked".into(), json!(seen_ip));
      args.data.insert("voter".into(), json!(args.actor.name));
    });
    let (_, submitter) = submitter(FixedOrg, hooks).await;

    let mut extra = VoteData::new();
    extra.insert("source".into(), json!("api"));
    let ctx = RequestContext {
      ip: Some("10.1.2.3".parse().unwrap()),
      ..RequestContext::script()
    };

    let msg = submitter
      .submit_vote(&actor(), &link(), Direction::Up, extra, &ctx)
      .await
      .unwrap();

    assert_eq!(msg.data["source"], json!("api"));
    assert_eq!(msg.data["ip"], json!("10.1.2.3"));
    assert_eq!(msg.data["org"], json!("Example ISP"));
    assert_eq!(msg.data["hooked"], json!(true));
    assert_eq!(msg.data["voter"], json!("alice"));
  }

  #[tokio::test]
  async fn no_ip_means_no_org_lookup() {
    let (_, submitter) = submitter(FixedOrg, HookRegistry::new()).await;

    let msg = submitter
      .submit_vote(
        &actor(),
        &link(),
        Direction::Up,
        VoteData::new(),
        &RequestContext::script(),
      )
      .await
      .unwrap();

    assert!(!msg.data.contains_key("ip"));
    assert!(!msg.data.contains_key("org"));
  }

  #[tokio::test]
  async fn event_context_is_captured_only_for_interactive_requests() {
    let (store, submitter) = submitter(NoOrgResolver, HookRegistry::new()).await;
    let interactive = RequestContext {
      ip:          Some("10.1.2.3".parse().unwrap()),
      interactive: true,
      session_id:  Some("s-1".into()),
      event:       EventContext {
        actor_id: Some(7),
        locale: Some("en-GB".into()),
        ..Default::default()
      },
    };

    submitter
      .submit_vote(&actor(), &link(), Direction::Up, VoteData::new(), &interactive)
      .await
      .unwrap();
    submitter
      .submit_vote(
        &actor(),
        &link(),
        Direction::Up,
        VoteData::new(),
        &RequestContext::script(),
      )
      .await
      .unwrap();

    let msgs = queued(&store.peek_queue(LINK_VOTE_QUEUE).await.unwrap());
    let captured = msgs[0].event_data.as_ref().unwrap();
    assert_eq!(captured.context.locale.as_deref(), Some("en-GB"));
    assert_eq!(captured.sensitive.session_id.as_deref(), Some("s-1"));
    assert_eq!(captured.sensitive.ip, interactive.ip);
    assert!(msgs[1].event_data.is_none());
  }

  fn flaky_submitter(flaky: Flaky) -> (Arc<Flaky>, VoteSubmitter<Flaky, NoOrgResolver>) {
    let store = Arc::new(flaky);
    let intents = IntentRecorder::new(store.clone(), Duration::from_secs(60));
    let submitter = VoteSubmitter::new(
      store.clone(),
      intents,
      Arc::new(NoOrgResolver),
      Arc::new(HookRegistry::new()),
    );
    (store, submitter)
  }

  #[tokio::test]
  async fn enqueue_failure_is_returned_to_the_caller() {
    let (store, submitter) = flaky_submitter(Flaky::queue_down());

    let err = submitter
      .submit_vote(
        &actor(),
        &link(),
        Direction::Up,
        VoteData::new(),
        &RequestContext::script(),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, SubmitError::Enqueue { ref queue, .. } if queue == LINK_VOTE_QUEUE));
    assert!(store.enqueued().is_empty());
  }

  #[tokio::test]
  async fn intent_cache_failure_does_not_block_submission() {
    let (store, submitter) = flaky_submitter(Flaky::cache_down());

    let msg = submitter
      .submit_vote(
        &actor(),
        &comment(),
        Direction::Down,
        VoteData::new(),
        &RequestContext::script(),
      )
      .await
      .unwrap();

    assert_eq!(msg.thing_fullname, TargetId::comment(4));
    let enqueued = store.enqueued();
    assert_eq!(enqueued.len(), 1);
    assert_eq!(enqueued[0].0, COMMENT_VOTE_QUEUE);
  }
}
