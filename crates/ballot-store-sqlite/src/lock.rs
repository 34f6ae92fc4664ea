//! [`LockService`] impl: expiring lease rows in the `locks` table.
//!
//! Every process opening the same file shares the table, so a lock taken by
//! one consumer excludes all others. A lock is released when its guard is
//! dropped. A holder that dies without releasing blocks the key until its
//! lease runs out.

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use ballot_core::cache::LockService;

use crate::{Error, Result, SqliteStore, encode::now_millis};

/// How long a lock row stays valid when its holder never releases it.
pub const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(30);

/// Pause between attempts on a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Holds a lock row until dropped.
pub struct SqliteLockGuard {
  conn:      tokio_rusqlite::Connection,
  namespace: String,
  key:       String,
  holder:    String,
}

impl SqliteLockGuard {
  pub fn namespace(&self) -> &str { &self.namespace }

  pub fn key(&self) -> &str { &self.key }
}

impl Drop for SqliteLockGuard {
  fn drop(&mut self) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      // No runtime to release on; the lease expires instead.
      return;
    };
    let conn      = self.conn.clone();
    let namespace = std::mem::take(&mut self.namespace);
    let key       = std::mem::take(&mut self.key);
    let holder    = std::mem::take(&mut self.holder);

    runtime.spawn(async move {
      let released = conn
        .call(move |conn| {
          conn.execute(
            "DELETE FROM locks WHERE namespace = ?1 AND key = ?2 AND holder = ?3",
            rusqlite::params![namespace, key, holder],
          )?;
          Ok(())
        })
        .await;
      if let Err(e) = released {
        tracing::warn!(error = %e, "failed to release lock; it expires with its lease");
      }
    });
  }
}

impl SqliteStore {
  fn lock_lease_millis(&self) -> i64 {
    i64::try_from(self.lock_lease.as_millis()).unwrap_or(i64::MAX)
  }

  /// One attempt at the lock. Replaces an expired row left by a dead holder.
  async fn try_lock(&self, namespace: &str, key: &str, holder: &str) -> Result<bool> {
    let namespace  = namespace.to_owned();
    let key        = key.to_owned();
    let holder     = holder.to_owned();
    let now        = now_millis();
    let expires_at = now.saturating_add(self.lock_lease_millis());

    let taken = self
      .conn
      .call(move |conn| {
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
          "DELETE FROM locks WHERE namespace = ?1 AND key = ?2 AND expires_at <= ?3",
          rusqlite::params![namespace, key, now],
        )?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO locks (namespace, key, holder, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![namespace, key, holder, expires_at],
        )?;
        tx.commit()?;
        Ok(inserted == 1)
      })
      .await?;
    Ok(taken)
  }
}

impl LockService for SqliteStore {
  type Guard = SqliteLockGuard;
  type Error = Error;

  async fn acquire(
    &self,
    namespace: &str,
    key: &str,
    timeout: Duration,
  ) -> Result<SqliteLockGuard> {
    let holder   = Uuid::new_v4().hyphenated().to_string();
    let deadline = Instant::now() + timeout;

    loop {
      if self.try_lock(namespace, key, &holder).await? {
        return Ok(SqliteLockGuard {
          conn: self.conn.clone(),
          namespace: namespace.to_owned(),
          key: key.to_owned(),
          holder,
        });
      }

      let now = Instant::now();
      if now >= deadline {
        return Err(Error::LockTimeout {
          namespace: namespace.to_owned(),
          key: key.to_owned(),
          timeout,
        });
      }
      tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
    }
  }
}
