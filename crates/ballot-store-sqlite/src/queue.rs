//! [`QueueTransport`] impl: a durable, at-least-once queue in one table.
//!
//! Consuming a message leases it: it gets a fresh lease id and stays
//! invisible until `visible_at`. Acks and nacks must present the current
//! lease, so a consumer whose lease ran out (and whose message was handed to
//! someone else) cannot ack or release it.

use chrono::Utc;
use uuid::Uuid;

use ballot_core::queue::{Delivery, QueueTransport};

use crate::{
  Error, Result, SqliteStore,
  encode::{encode_dt, now_millis},
};

struct RawClaim {
  message_id: i64,
  body:       String,
  attempts:   i64,
  lease:      Uuid,
}

impl SqliteStore {
  fn lease_millis(&self) -> i64 {
    i64::try_from(self.queue_lease.as_millis()).unwrap_or(i64::MAX)
  }

  /// Number of messages in `queue`, leased or not.
  pub async fn queue_len(&self, queue: &str) -> Result<usize> {
    let queue = queue.to_owned();
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM queue_messages WHERE queue = ?1",
          rusqlite::params![queue],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  /// Bodies of every message in `queue`, oldest first, without leasing.
  pub async fn peek_queue(&self, queue: &str) -> Result<Vec<String>> {
    let queue = queue.to_owned();
    let bodies = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT body FROM queue_messages WHERE queue = ?1 ORDER BY message_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![queue], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(bodies)
  }
}

impl QueueTransport for SqliteStore {
  type Error = Error;

  async fn enqueue(&self, queue: &str, payload: &str) -> Result<()> {
    let queue   = queue.to_owned();
    let payload = payload.to_owned();
    let at      = encode_dt(Utc::now());
    let now     = now_millis();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO queue_messages (queue, body, enqueued_at, visible_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![queue, payload, at, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn consume_one(&self, queue: &str) -> Result<Option<Delivery>> {
    Ok(self.consume_batch(queue, 1).await?.pop())
  }

  async fn consume_batch(&self, queue: &str, limit: usize) -> Result<Vec<Delivery>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let queue_name = queue.to_owned();
    let limit      = i64::try_from(limit).unwrap_or(i64::MAX);
    let now        = now_millis();
    let visible_at = now.saturating_add(self.lease_millis());

    let claims: Vec<RawClaim> = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so two processes sharing
        // the file cannot lease the same rows.
        let tx = conn
          .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let visible: Vec<(i64, String, i64)> = {
          let mut stmt = tx.prepare(
            "SELECT message_id, body, attempts FROM queue_messages
             WHERE queue = ?1 AND visible_at <= ?2
             ORDER BY message_id
             LIMIT ?3",
          )?;
          stmt
            .query_map(rusqlite::params![queue_name, now, limit], |row| {
              Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut claims = Vec::with_capacity(visible.len());
        for (message_id, body, attempts) in visible {
          let lease = Uuid::new_v4();
          tx.execute(
            "UPDATE queue_messages
             SET lease = ?1, visible_at = ?2, attempts = attempts + 1
             WHERE message_id = ?3",
            rusqlite::params![lease.hyphenated().to_string(), visible_at, message_id],
          )?;
          claims.push(RawClaim { message_id, body, attempts: attempts + 1, lease });
        }

        tx.commit()?;
        Ok(claims)
      })
      .await?;

    Ok(
      claims
        .into_iter()
        .map(|claim| Delivery {
          queue:      queue.to_owned(),
          message_id: claim.message_id,
          lease:      claim.lease,
          body:       claim.body,
          attempts:   u32::try_from(claim.attempts).unwrap_or(u32::MAX),
        })
        .collect(),
    )
  }

  async fn ack(&self, delivery: &Delivery) -> Result<()> {
    let message_id = delivery.message_id;
    let lease      = delivery.lease.hyphenated().to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM queue_messages WHERE message_id = ?1 AND lease = ?2",
          rusqlite::params![message_id, lease],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn nack(&self, delivery: &Delivery) -> Result<()> {
    let message_id = delivery.message_id;
    let lease      = delivery.lease.hyphenated().to_string();
    let now        = now_millis();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE queue_messages SET lease = NULL, visible_at = ?1
           WHERE message_id = ?2 AND lease = ?3",
          rusqlite::params![now, message_id, lease],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
