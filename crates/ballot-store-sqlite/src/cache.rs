//! [`Cache`] and [`ListingStore`] impls. Both are cache-resident data:
//! expiring key/value pairs and rebuildable listings.

use std::time::Duration;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use ballot_core::{
  cache::Cache,
  listing::{Listing, ListingKey},
  store::ListingStore,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{encode_dt, now_millis},
};

/// Expired rows deleted per write. Each write removes more rows than it
/// adds, so the table stays bounded by the live entries.
const PURGE_BATCH: i64 = 64;

fn ttl_millis(ttl: Duration) -> i64 {
  i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

impl SqliteStore {
  /// Number of rows in the cache table, expired or not.
  pub async fn cache_rows(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }
}

impl Cache for SqliteStore {
  type Error = Error;

  async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
    let key        = key.to_owned();
    let value      = value.to_owned();
    let now        = now_millis();
    let expires_at = ttl.map(|ttl| now.saturating_add(ttl_millis(ttl)));

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM cache WHERE rowid IN (
             SELECT rowid FROM cache
             WHERE expires_at IS NOT NULL AND expires_at <= ?1
             LIMIT ?2
           )",
          rusqlite::params![now, PURGE_BATCH],
        )?;
        tx.execute(
          "INSERT INTO cache (key, value, expires_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (key) DO UPDATE SET
             value = excluded.value, expires_at = excluded.expires_at",
          rusqlite::params![key, value, expires_at],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();
    let now = now_millis();

    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM cache
               WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
              rusqlite::params![key, now],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }
}

impl ListingStore for SqliteStore {
  type Error = Error;

  async fn get_listing(&self, key: &ListingKey) -> Result<Option<Listing>> {
    let key = key.cache_key();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entries_json FROM listings WHERE listing_key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
  }

  async fn put_listing(&self, key: &ListingKey, listing: &Listing) -> Result<()> {
    let key     = key.cache_key();
    let entries = serde_json::to_string(listing)?;
    let at      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO listings (listing_key, entries_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (listing_key) DO UPDATE SET
             entries_json = excluded.entries_json,
             updated_at   = excluded.updated_at",
          rusqlite::params![key, entries, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
