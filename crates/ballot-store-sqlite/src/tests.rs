//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use ballot_core::{
  cache::{Cache, LockService},
  context::{EventContext, EventData},
  id::TargetId,
  listing::{Dimension, Listing, ListingEntry, Sort},
  queue::QueueTransport,
  store::{ContentLookup, ListingStore, VoteStore},
  thing::{Account, Comment, Community, Link, Target},
  vote::{Direction, NewVote, VoteData},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn link(id: u64) -> Link {
  Link {
    link_id:      id,
    author_id:    10,
    community_id: 20,
    url:          Some("https://www.example.com/a".into()),
    created_at:   Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ups:          0,
    downs:        0,
    spam:         false,
    deleted:      false,
  }
}

fn comment(id: u64) -> Comment {
  Comment {
    comment_id:   id,
    link_id:      1,
    author_id:    11,
    community_id: 20,
    created_at:   Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
    ups:          0,
    downs:        0,
    spam:         false,
    deleted:      false,
  }
}

fn new_vote(actor_id: u64, target: TargetId, direction: Direction) -> NewVote {
  NewVote {
    actor_id,
    target,
    direction,
    date: Utc.timestamp_opt(1_700_000_500, 0).unwrap(),
    data: VoteData::new(),
    event_data: None,
  }
}

async fn link_tally(s: &SqliteStore, id: u64) -> (i64, i64) {
  match s.target(TargetId::link(id)).await.unwrap() {
    Some(Target::Link(l)) => (l.ups, l.downs),
    other => panic!("expected link, got {other:?}"),
  }
}

// ─── Content lookup ──────────────────────────────────────────────────────────

#[tokio::test]
async fn accounts_resolve_singly_and_in_batches() {
  let s = store().await;
  s.put_account(&Account { account_id: 1, name: "alice".into() })
    .await
    .unwrap();
  s.put_account(&Account { account_id: 2, name: "bob".into() })
    .await
    .unwrap();

  let alice = s.account(1).await.unwrap().unwrap();
  assert_eq!(alice.name, "alice");
  assert!(s.account(99).await.unwrap().is_none());

  let batch = s.accounts_by_id(&[1, 2, 99]).await.unwrap();
  assert_eq!(batch.len(), 2);
  assert_eq!(batch[&2].name, "bob");
  assert!(s.accounts_by_id(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn communities_resolve_in_batches() {
  let s = store().await;
  s.put_community(&Community { community_id: 20, name: "rust".into() })
    .await
    .unwrap();

  let batch = s.communities_by_id(&[20, 21]).await.unwrap();
  assert_eq!(batch.len(), 1);
  assert_eq!(batch[&20].name, "rust");
}

#[tokio::test]
async fn targets_resolve_by_kind() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();
  s.put_comment(&comment(5)).await.unwrap();

  assert_eq!(
    s.target(TargetId::link(1)).await.unwrap(),
    Some(Target::Link(link(1)))
  );
  assert_eq!(
    s.target(TargetId::comment(5)).await.unwrap(),
    Some(Target::Comment(comment(5)))
  );
  // Same numeric id, wrong kind.
  assert!(s.target(TargetId::comment(1)).await.unwrap().is_none());
  assert!(s.target("account:1".parse().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn links_by_id_skips_unknown() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();
  s.put_link(&link(2)).await.unwrap();

  let links = s.links_by_id(&[2, 1, 3]).await.unwrap();
  let ids: Vec<u64> = links.iter().map(|l| l.link_id).collect();
  assert_eq!(ids, vec![1, 2]);
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_vote_is_automatic_initial_and_counts() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  let vote = s
    .commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  assert_eq!(vote.direction, Direction::Up);
  assert_eq!(vote.previous_direction, None);
  assert!(vote.is_automatic_initial_vote);
  assert!(vote.effects.affects_score);
  assert_eq!(link_tally(&s, 1).await, (1, 0));
}

#[tokio::test]
async fn changed_vote_records_previous_and_moves_tally() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  s.commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  let vote = s
    .commit(new_vote(7, TargetId::link(1), Direction::Down))
    .await
    .unwrap();

  assert_eq!(vote.previous_direction, Some(Direction::Up));
  assert!(!vote.is_automatic_initial_vote);
  assert!(vote.effects.affects_score);
  assert_eq!(link_tally(&s, 1).await, (0, 1));
}

#[tokio::test]
async fn recommitting_the_same_vote_is_idempotent() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  let first = s
    .commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  assert!(first.fanout_pending);
  s.settle_fanout(&first).await.unwrap();

  let again = s
    .commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();

  assert!(!again.is_automatic_initial_vote);
  assert!(!again.effects.affects_score);
  assert!(!again.fanout_pending);
  assert!(!again.warrants_fanout());
  assert_eq!(link_tally(&s, 1).await, (1, 0));
}

#[tokio::test]
async fn unsettled_fanout_survives_a_duplicate_commit() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  s.commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  let again = s
    .commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();

  assert!(!again.is_automatic_initial_vote);
  assert!(!again.effects.affects_score);
  assert!(again.warrants_fanout());
  assert!(s.get_vote(7, TargetId::link(1)).await.unwrap().unwrap().fanout_pending);
  assert_eq!(link_tally(&s, 1).await, (1, 0));
}

#[tokio::test]
async fn settling_a_replaced_vote_leaves_the_newer_one_pending() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  let up = s
    .commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  s.commit(new_vote(7, TargetId::link(1), Direction::Down))
    .await
    .unwrap();
  s.settle_fanout(&up).await.unwrap();

  let stored = s.get_vote(7, TargetId::link(1)).await.unwrap().unwrap();
  assert_eq!(stored.direction, Direction::Down);
  assert!(stored.fanout_pending);
}

#[tokio::test]
async fn retracted_vote_removes_its_tally() {
  let s = store().await;
  s.put_comment(&comment(5)).await.unwrap();

  s.commit(new_vote(7, TargetId::comment(5), Direction::Down))
    .await
    .unwrap();
  s.commit(new_vote(7, TargetId::comment(5), Direction::None))
    .await
    .unwrap();

  let Some(Target::Comment(c)) = s.target(TargetId::comment(5)).await.unwrap()
  else {
    panic!("comment missing");
  };
  assert_eq!((c.ups, c.downs), (0, 0));
}

#[tokio::test]
async fn votes_by_different_actors_are_separate_rows() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  s.commit(new_vote(7, TargetId::link(1), Direction::Up))
    .await
    .unwrap();
  let other = s
    .commit(new_vote(8, TargetId::link(1), Direction::Up))
    .await
    .unwrap();

  assert!(other.is_automatic_initial_vote);
  assert_eq!(link_tally(&s, 1).await, (2, 0));
}

#[tokio::test]
async fn get_vote_roundtrips_data_and_event_context() {
  let s = store().await;
  s.put_link(&link(1)).await.unwrap();

  let mut input = new_vote(7, TargetId::link(1), Direction::Up);
  input.data.insert("ip".into(), json!("10.0.0.1"));
  input.event_data = Some(EventData {
    context: EventContext { locale: Some("en".into()), ..Default::default() },
    ..Default::default()
  });
  let committed = s.commit(input).await.unwrap();

  let fetched = s.get_vote(7, TargetId::link(1)).await.unwrap().unwrap();
  assert_eq!(fetched, committed);
  assert!(s.get_vote(8, TargetId::link(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn votes_on_non_votable_kinds_are_rejected() {
  let s = store().await;
  let err = s
    .commit(new_vote(7, "community:1".parse().unwrap(), Direction::Up))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Core(e) if e.is_incompatible_type()));
}

// ─── Cache & listings ────────────────────────────────────────────────────────

#[tokio::test]
async fn cache_values_overwrite_and_expire() {
  let s = store().await;

  s.set("k", "one", None).await.unwrap();
  s.set("k", "two", Some(Duration::from_secs(60))).await.unwrap();
  assert_eq!(s.get("k").await.unwrap().as_deref(), Some("two"));

  s.set("gone", "x", Some(Duration::ZERO)).await.unwrap();
  assert!(s.get("gone").await.unwrap().is_none());
  assert!(s.get("never-set").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_cache_rows_are_purged_on_write() {
  let s = store().await;
  s.set("live", "x", Some(Duration::from_secs(60))).await.unwrap();

  for i in 0..500 {
    s.set(&format!("k{i}"), "x", Some(Duration::ZERO)).await.unwrap();
  }

  // The live entry and the newest expired one.
  assert_eq!(s.cache_rows().await.unwrap(), 2);
  assert_eq!(s.get("live").await.unwrap().as_deref(), Some("x"));
}

#[tokio::test]
async fn listings_roundtrip_per_key() {
  let s = store().await;
  let hot = Dimension::Author(10).key(Sort::Hot);
  let top = Dimension::Author(10).key(Sort::Top);

  let mut listing = Listing::default();
  listing.insert([ListingEntry { target: TargetId::link(1), score: 2.0 }]);
  s.put_listing(&hot, &listing).await.unwrap();

  assert_eq!(s.get_listing(&hot).await.unwrap(), Some(listing));
  assert!(s.get_listing(&top).await.unwrap().is_none());
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn acked_messages_are_gone() {
  let s = store().await;
  s.enqueue("q", "a").await.unwrap();

  let d = s.consume_one("q").await.unwrap().unwrap();
  assert_eq!(d.body, "a");
  assert_eq!(d.attempts, 1);
  // Leased: invisible to other consumers.
  assert!(s.consume_one("q").await.unwrap().is_none());

  s.ack(&d).await.unwrap();
  assert_eq!(s.queue_len("q").await.unwrap(), 0);
}

#[tokio::test]
async fn nacked_messages_are_redelivered() {
  let s = store().await;
  s.enqueue("q", "a").await.unwrap();

  let first = s.consume_one("q").await.unwrap().unwrap();
  s.nack(&first).await.unwrap();

  let second = s.consume_one("q").await.unwrap().unwrap();
  assert_eq!(second.message_id, first.message_id);
  assert_eq!(second.attempts, 2);
  assert_ne!(second.lease, first.lease);
}

#[tokio::test]
async fn expired_leases_are_redelivered_and_stale_acks_ignored() {
  let s = store().await.with_queue_lease(Duration::ZERO);
  s.enqueue("q", "a").await.unwrap();

  let stale = s.consume_one("q").await.unwrap().unwrap();
  let fresh = s.consume_one("q").await.unwrap().unwrap();
  assert_eq!(stale.message_id, fresh.message_id);

  s.ack(&stale).await.unwrap();
  assert_eq!(s.queue_len("q").await.unwrap(), 1);

  s.ack(&fresh).await.unwrap();
  assert_eq!(s.queue_len("q").await.unwrap(), 0);
}

#[tokio::test]
async fn batches_are_bounded_ordered_and_per_queue() {
  let s = store().await;
  for body in ["1", "2", "3"] {
    s.enqueue("q", body).await.unwrap();
  }
  s.enqueue("other", "x").await.unwrap();

  let batch = s.consume_batch("q", 2).await.unwrap();
  let bodies: Vec<&str> = batch.iter().map(|d| d.body.as_str()).collect();
  assert_eq!(bodies, vec!["1", "2"]);

  let rest = s.consume_batch("q", 10).await.unwrap();
  assert_eq!(rest.len(), 1);
  assert_eq!(rest[0].body, "3");
  assert_eq!(s.peek_queue("other").await.unwrap(), vec!["x"]);
}

// ─── Locks ───────────────────────────────────────────────────────────────────

const SHORT: Duration = Duration::from_millis(50);
const LONG: Duration = Duration::from_secs(2);

#[tokio::test]
async fn second_acquire_times_out_while_held() {
  let s = store().await;
  let _held = s.acquire("voting", "a", SHORT).await.unwrap();

  let err = s.acquire("voting", "a", SHORT).await;
  assert!(matches!(err, Err(Error::LockTimeout { .. })));
}

#[tokio::test]
async fn dropping_the_guard_releases_the_lock() {
  let s = store().await;
  let held = s.acquire("voting", "a", SHORT).await.unwrap();
  drop(held);

  assert!(s.acquire("voting", "a", LONG).await.is_ok());
}

#[tokio::test]
async fn distinct_keys_and_namespaces_do_not_contend() {
  let s = store().await;
  let _a = s.acquire("voting", "a", SHORT).await.unwrap();

  assert!(s.acquire("voting", "b", SHORT).await.is_ok());
  assert!(s.acquire("listing", "a", SHORT).await.is_ok());
}

#[tokio::test]
async fn waiter_gets_the_lock_when_released_in_time() {
  let s = store().await;
  let held = s.acquire("voting", "a", SHORT).await.unwrap();

  let waiter = {
    let s = s.clone();
    tokio::spawn(async move { s.acquire("voting", "a", LONG).await.is_ok() })
  };
  tokio::time::sleep(Duration::from_millis(30)).await;
  drop(held);

  assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn expired_locks_are_taken_over_and_stale_releases_ignored() {
  let s = store().await;
  let lapsing = s.clone().with_lock_lease(Duration::ZERO);

  let stale = lapsing.acquire("listing", "a", SHORT).await.unwrap();
  let _fresh = s.acquire("listing", "a", SHORT).await.unwrap();

  drop(stale);
  tokio::time::sleep(Duration::from_millis(30)).await;
  assert!(s.acquire("listing", "a", SHORT).await.is_err());
}

#[tokio::test]
async fn locks_exclude_across_stores_sharing_a_file() {
  let path = std::env::temp_dir()
    .join(format!("ballot-locks-{}.sqlite3", uuid::Uuid::new_v4()));
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();

  let held = a.acquire("listing", "listing-liked:1", SHORT).await.unwrap();
  assert!(matches!(
    b.acquire("listing", "listing-liked:1", SHORT).await,
    Err(Error::LockTimeout { .. })
  ));

  drop(held);
  assert!(b.acquire("listing", "listing-liked:1", LONG).await.is_ok());

  drop((a, b));
  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
