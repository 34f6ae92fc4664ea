//! [`SqliteStore`], the SQLite implementation of the storage collaborators,
//! and its [`ContentLookup`] impl.

use std::{collections::HashMap, path::Path, time::Duration};

use rusqlite::OptionalExtension as _;

use ballot_core::{
  id::{AccountId, CommunityId, TargetId, TargetKind},
  store::ContentLookup,
  thing::{Account, Comment, Community, Link, Target},
};

use crate::{
  Error, Result,
  encode::{
    COMMENT_COLUMNS, LINK_COLUMNS, RawAccount, RawComment, RawCommunity,
    RawLink, encode_dt, encode_id, encode_ids, placeholders,
  },
  lock::DEFAULT_LOCK_LEASE,
  schema::SCHEMA,
};

/// How long a consumed queue message stays invisible before redelivery.
pub const DEFAULT_QUEUE_LEASE: Duration = Duration::from_secs(60);

// ─── Store ───────────────────────────────────────────────────────────────────

/// Content lookup, vote store, listing store, cache, lock service and durable
/// queue backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:        tokio_rusqlite::Connection,
  pub(crate) queue_lease: Duration,
  pub(crate) lock_lease:  Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self {
      conn,
      queue_lease: DEFAULT_QUEUE_LEASE,
      lock_lease: DEFAULT_LOCK_LEASE,
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self {
      conn,
      queue_lease: DEFAULT_QUEUE_LEASE,
      lock_lease: DEFAULT_LOCK_LEASE,
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Use `lease` as the redelivery timeout for consumed queue messages.
  pub fn with_queue_lease(mut self, lease: Duration) -> Self {
    self.queue_lease = lease;
    self
  }

  /// Use `lease` as the expiry of lock rows whose holder never releases them.
  pub fn with_lock_lease(mut self, lease: Duration) -> Self {
    self.lock_lease = lease;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────
  //
  // Content is owned by other systems. These upserts mirror it into the
  // store (and set up fixtures in tests).

  pub async fn put_account(&self, account: &Account) -> Result<()> {
    let id = encode_id(account.account_id)?;
    let name = account.name.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO accounts (account_id, name) VALUES (?1, ?2)",
          rusqlite::params![id, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_community(&self, community: &Community) -> Result<()> {
    let id = encode_id(community.community_id)?;
    let name = community.name.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO communities (community_id, name) VALUES (?1, ?2)",
          rusqlite::params![id, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_link(&self, link: &Link) -> Result<()> {
    let link_id      = encode_id(link.link_id)?;
    let author_id    = encode_id(link.author_id)?;
    let community_id = encode_id(link.community_id)?;
    let created_at   = encode_dt(link.created_at);
    let link         = link.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT OR REPLACE INTO links ({LINK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ),
          rusqlite::params![
            link_id,
            author_id,
            community_id,
            link.url,
            created_at,
            link.ups,
            link.downs,
            link.spam,
            link.deleted,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_comment(&self, comment: &Comment) -> Result<()> {
    let comment_id   = encode_id(comment.comment_id)?;
    let link_id      = encode_id(comment.link_id)?;
    let author_id    = encode_id(comment.author_id)?;
    let community_id = encode_id(comment.community_id)?;
    let created_at   = encode_dt(comment.created_at);
    let comment      = comment.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT OR REPLACE INTO comments ({COMMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ),
          rusqlite::params![
            comment_id,
            link_id,
            author_id,
            community_id,
            created_at,
            comment.ups,
            comment.downs,
            comment.spam,
            comment.deleted,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn link(&self, id: u64) -> Result<Option<Link>> {
    let id = encode_id(id)?;
    let raw: Option<RawLink> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LINK_COLUMNS} FROM links WHERE link_id = ?1"),
              rusqlite::params![id],
              RawLink::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLink::into_link).transpose()
  }

  async fn comment(&self, id: u64) -> Result<Option<Comment>> {
    let id = encode_id(id)?;
    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1"
              ),
              rusqlite::params![id],
              RawComment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawComment::into_comment).transpose()
  }
}

// ─── ContentLookup impl ──────────────────────────────────────────────────────

impl ContentLookup for SqliteStore {
  type Error = Error;

  async fn account(&self, id: AccountId) -> Result<Option<Account>> {
    let id = encode_id(id)?;
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT account_id, name FROM accounts WHERE account_id = ?1",
              rusqlite::params![id],
              |row| Ok(RawAccount { account_id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAccount::into_account).transpose()
  }

  async fn accounts_by_id(
    &self,
    ids: &[AccountId],
  ) -> Result<HashMap<AccountId, Account>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids = encode_ids(ids)?;

    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT account_id, name FROM accounts WHERE account_id IN ({})",
          placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(RawAccount { account_id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| raw.into_account().map(|a| (a.account_id, a)))
      .collect()
  }

  async fn communities_by_id(
    &self,
    ids: &[CommunityId],
  ) -> Result<HashMap<CommunityId, Community>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids = encode_ids(ids)?;

    let raws: Vec<RawCommunity> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT community_id, name FROM communities WHERE community_id IN ({})",
          placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(RawCommunity { community_id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| raw.into_community().map(|c| (c.community_id, c)))
      .collect()
  }

  async fn target(&self, id: TargetId) -> Result<Option<Target>> {
    match id.kind {
      TargetKind::Link => Ok(self.link(id.id).await?.map(Target::Link)),
      TargetKind::Comment => Ok(self.comment(id.id).await?.map(Target::Comment)),
      TargetKind::Account | TargetKind::Community => Ok(None),
    }
  }

  async fn links_by_id(&self, ids: &[u64]) -> Result<Vec<Link>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = encode_ids(ids)?;

    let raws: Vec<RawLink> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {LINK_COLUMNS} FROM links WHERE link_id IN ({}) ORDER BY link_id",
          placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), RawLink::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLink::into_link).collect()
  }
}
