//! Derived-listing consumers for the author, community and domain query
//! queues, and the locked read-modify-write they share with the commit
//! consumer.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
  time::Duration,
};

use ballot_core::{
  cache::LockService,
  domain::domain_permutations,
  id::{TargetId, TargetKind},
  listing::{Dimension, Listing, ListingEntry, Sort, VOTE_SORTS},
  queue::{Delivery, QueueTransport},
  shard::{AUTHOR_QUERY_QUEUE, COMMUNITY_QUERY_QUEUE, DOMAIN_QUERY_QUEUE, queue_name},
  store::{ContentLookup, ListingStore},
  thing::{Link, Target},
};

use crate::{config::WorkerConfig, error::ConsumeError, lock::LISTING_LOCK_NAMESPACE};

/// Apply `apply` to each `sorts` listing of `dimension`, holding the
/// dimension's lock for the whole cycle. Absent listings start empty.
pub async fn update_listings<S, L>(
  store: &S,
  locks: &L,
  dimension: &Dimension,
  sorts: &[Sort],
  timeout: Duration,
  mut apply: impl FnMut(Sort, &mut Listing) + Send,
) -> Result<(), ConsumeError>
where
  S: ListingStore,
  L: LockService,
{
  let _guard = locks
    .acquire(LISTING_LOCK_NAMESPACE, &dimension.lock_key(), timeout)
    .await
    .map_err(ConsumeError::lock)?;

  for &sort in sorts {
    let key = dimension.key(sort);
    let mut listing = store
      .get_listing(&key)
      .await
      .map_err(ConsumeError::storage)?
      .unwrap_or_default();
    apply(sort, &mut listing);
    store
      .put_listing(&key, &listing)
      .await
      .map_err(ConsumeError::storage)?;
  }
  Ok(())
}

// ─── Query families ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFamily {
  Author,
  Community,
  Domain,
}

impl QueryFamily {
  pub fn prefix(self) -> &'static str {
    match self {
      Self::Author => AUTHOR_QUERY_QUEUE,
      Self::Community => COMMUNITY_QUERY_QUEUE,
      Self::Domain => DOMAIN_QUERY_QUEUE,
    }
  }

  fn limit(self, config: &WorkerConfig) -> usize {
    match self {
      Self::Author => config.author_query_limit,
      Self::Community => config.community_query_limit,
      Self::Domain => config.domain_query_limit,
    }
  }

  /// The listing dimensions `link` belongs to in this family.
  pub fn dimensions(self, link: &Link) -> Vec<Dimension> {
    match self {
      Self::Author => vec![Dimension::Author(link.author_id)],
      Self::Community => vec![Dimension::Community(link.community_id)],
      Self::Domain => link
        .url
        .as_deref()
        .map(domain_permutations)
        .unwrap_or_default()
        .into_iter()
        .map(Dimension::Domain)
        .collect(),
    }
  }
}

// ─── Consumer ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
pub struct BatchReport {
  pub acked:         usize,
  pub nacked:        usize,
  pub failed_groups: Vec<Dimension>,
}

impl BatchReport {
  /// Whether any delivery left the queue. Released deliveries are visible
  /// again at once, so a batch that only released work counts as idle.
  pub fn made_progress(&self) -> bool { self.acked > 0 }
}

struct Applied {
  /// Link ids that belong to at least one group that failed.
  retry:         HashSet<u64>,
  failed_groups: Vec<Dimension>,
}

pub struct ListingConsumer<S, L> {
  family:       QueryFamily,
  queue:        String,
  limit:        usize,
  store:        Arc<S>,
  locks:        Arc<L>,
  lock_timeout: Duration,
}

impl<S, L> ListingConsumer<S, L>
where
  S: ContentLookup + ListingStore + QueueTransport,
  L: LockService,
{
  /// Consumer for shard `shard` of `family`, or its single queue.
  pub fn new(
    family: QueryFamily,
    shard: Option<u32>,
    store: Arc<S>,
    locks: Arc<L>,
    config: &WorkerConfig,
  ) -> Self {
    Self {
      family,
      queue: queue_name(family.prefix(), shard),
      limit: family.limit(config),
      store,
      locks,
      lock_timeout: config.lock_timeout(),
    }
  }

  pub fn queue(&self) -> &str { &self.queue }

  /// Process one batch. `None` when the queue had nothing visible.
  pub async fn poll_batch(&self) -> Result<Option<BatchReport>, ConsumeError> {
    let deliveries = self
      .store
      .consume_batch(&self.queue, self.limit)
      .await
      .map_err(ConsumeError::queue)?;
    if deliveries.is_empty() {
      return Ok(None);
    }

    let ids: Vec<Option<u64>> = deliveries.iter().map(link_id).collect();
    let requested: Vec<u64> = ids.iter().flatten().copied().collect();

    let applied = self.apply(&requested).await;
    if let Err(e) = &applied {
      tracing::warn!(queue = %self.queue, error = %e, "batch failed, releasing");
    }

    let mut report = BatchReport::default();
    for (delivery, id) in deliveries.iter().zip(&ids) {
      let retry = match (&applied, id) {
        (_, None) => false,
        (Err(_), Some(_)) => true,
        (Ok(applied), Some(id)) => applied.retry.contains(id),
      };
      if retry {
        self.store.nack(delivery).await.map_err(ConsumeError::queue)?;
        report.nacked += 1;
      } else {
        self.store.ack(delivery).await.map_err(ConsumeError::queue)?;
        report.acked += 1;
      }
    }
    if let Ok(applied) = applied {
      report.failed_groups = applied.failed_groups;
    }

    tracing::info!(
      queue = %self.queue,
      acked = report.acked,
      nacked = report.nacked,
      failed_groups = report.failed_groups.len(),
      "processed listing batch"
    );
    Ok(Some(report))
  }

  async fn apply(&self, requested: &[u64]) -> Result<Applied, ConsumeError> {
    let mut unique = requested.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let links = self
      .store
      .links_by_id(&unique)
      .await
      .map_err(ConsumeError::storage)?;
    if links.len() < unique.len() {
      tracing::warn!(
        queue = %self.queue,
        missing = unique.len() - links.len(),
        "dropping unknown links"
      );
    }

    let mut groups: HashMap<Dimension, Vec<Target>> = HashMap::new();
    for link in links.into_iter().filter(|l| !(l.spam || l.deleted)) {
      for dimension in self.family.dimensions(&link) {
        groups
          .entry(dimension)
          .or_default()
          .push(Target::Link(link.clone()));
      }
    }
    self.retain_owned(&mut groups).await?;

    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.sort_by_cached_key(|(dimension, _)| dimension.lock_key());

    let mut applied = Applied { retry: HashSet::new(), failed_groups: Vec::new() };
    for (dimension, members) in groups {
      let result = update_listings(
        self.store.as_ref(),
        self.locks.as_ref(),
        &dimension,
        &VOTE_SORTS,
        self.lock_timeout,
        |sort, listing| {
          listing.insert(members.iter().map(|t| ListingEntry::for_target(t, sort)))
        },
      )
      .await;

      if let Err(e) = result {
        tracing::warn!(
          queue = %self.queue,
          dimension = %dimension.lock_key(),
          error = %e,
          "listing group failed"
        );
        applied
          .retry
          .extend(members.iter().map(|t| t.target_id().id));
        applied.failed_groups.push(dimension);
      }
    }
    Ok(applied)
  }

  /// Drop groups whose owning account or community no longer resolves.
  async fn retain_owned(
    &self,
    groups: &mut HashMap<Dimension, Vec<Target>>,
  ) -> Result<(), ConsumeError> {
    let known: HashSet<u64> = match self.family {
      QueryFamily::Domain => return Ok(()),
      QueryFamily::Author => {
        let ids: Vec<u64> = groups.keys().filter_map(owner_id).collect();
        self
          .store
          .accounts_by_id(&ids)
          .await
          .map_err(ConsumeError::storage)?
          .into_keys()
          .collect()
      }
      QueryFamily::Community => {
        let ids: Vec<u64> = groups.keys().filter_map(owner_id).collect();
        self
          .store
          .communities_by_id(&ids)
          .await
          .map_err(ConsumeError::storage)?
          .into_keys()
          .collect()
      }
    };

    groups.retain(|dimension, members| {
      let keep = owner_id(dimension).is_none_or(|id| known.contains(&id));
      if !keep {
        tracing::warn!(
          dimension = %dimension.lock_key(),
          links = members.len(),
          "owner not found, dropping group"
        );
      }
      keep
    });
    Ok(())
  }
}

fn owner_id(dimension: &Dimension) -> Option<u64> {
  match dimension {
    Dimension::Author(id) | Dimension::Community(id) => Some(*id),
    _ => None,
  }
}

/// The link a query-queue delivery names, or `None` if it names anything
/// else.
fn link_id(delivery: &Delivery) -> Option<u64> {
  match delivery.body.parse::<TargetId>() {
    Ok(TargetId { kind: TargetKind::Link, id }) => Some(id),
    _ => {
      tracing::warn!(
        queue = %delivery.queue,
        body = %delivery.body,
        "dropping malformed listing update"
      );
      None
    }
  }
}
