//! [`VoteStore`] impl: vote upserts and tally maintenance.

use rusqlite::OptionalExtension as _;

use ballot_core::{
  id::{AccountId, TargetId, TargetKind},
  store::VoteStore,
  vote::{Direction, NewVote, Vote, VoteEffects},
};

use crate::{
  Error, Result, SqliteStore,
  encode::{RawVote, decode_direction, encode_dt, encode_id},
};

const VOTE_COLUMNS: &str = "actor_id, target, direction, previous_direction, \
                            date, data_json, event_data_json, fanout_pending";

impl VoteStore for SqliteStore {
  type Error = Error;

  /// Upsert the vote and adjust the target's tally in one transaction.
  ///
  /// The tally moves by the difference between the old and new direction,
  /// so committing the same vote twice leaves it unchanged. A pending
  /// fan-out mark is set by an eligible commit and survives later
  /// duplicate commits until settled.
  async fn commit(&self, input: NewVote) -> Result<Vote> {
    let actor_id   = encode_id(input.actor_id)?;
    let target_str = input.target.fullname();
    let target_id  = encode_id(input.target.id)?;
    let direction  = input.direction.as_str();
    let date_str   = encode_dt(input.date);
    let data_json  = serde_json::to_string(&input.data)?;
    let event_json = input
      .event_data
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let (tally_table, id_column) = match input.target.kind {
      TargetKind::Link => ("links", "link_id"),
      TargetKind::Comment => ("comments", "comment_id"),
      TargetKind::Account | TargetKind::Community => {
        return Err(ballot_core::Error::NotVotable(input.target).into());
      }
    };
    let (new_ups, new_downs) = input.direction.tally();

    let (previous, fanout_pending): (Option<String>, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<(String, bool)> = tx
          .query_row(
            "SELECT direction, fanout_pending FROM votes
             WHERE actor_id = ?1 AND target = ?2",
            rusqlite::params![actor_id, target_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let (previous, was_pending) = match existing {
          Some((stored, pending)) => (Some(stored), pending),
          None => (None, false),
        };
        let fanout_pending = was_pending
          || previous.as_deref() != Some(direction);

        tx.execute(
          &format!(
            "INSERT INTO votes ({VOTE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (actor_id, target) DO UPDATE SET
               direction          = excluded.direction,
               previous_direction = excluded.previous_direction,
               date               = excluded.date,
               data_json          = excluded.data_json,
               event_data_json    = excluded.event_data_json,
               fanout_pending     = excluded.fanout_pending"
          ),
          rusqlite::params![
            actor_id,
            target_str,
            direction,
            previous.as_deref(),
            date_str,
            data_json,
            event_json,
            fanout_pending,
          ],
        )?;

        let (old_ups, old_downs) = previous
          .as_deref()
          .and_then(Direction::parse)
          .unwrap_or_default()
          .tally();
        tx.execute(
          &format!(
            "UPDATE {tally_table}
             SET ups = ups + ?1, downs = downs + ?2
             WHERE {id_column} = ?3"
          ),
          rusqlite::params![new_ups - old_ups, new_downs - old_downs, target_id],
        )?;

        tx.commit()?;
        Ok((previous, fanout_pending))
      })
      .await?;

    let previous_direction =
      previous.as_deref().map(decode_direction).transpose()?;

    Ok(Vote {
      actor_id:                  input.actor_id,
      target:                    input.target,
      direction:                 input.direction,
      previous_direction,
      date:                      input.date,
      data:                      input.data,
      event_data:                input.event_data,
      is_automatic_initial_vote: previous_direction.is_none(),
      effects:                   VoteEffects {
        affects_score: previous_direction.unwrap_or_default() != input.direction,
      },
      fanout_pending,
    })
  }

  async fn get_vote(
    &self,
    actor_id: AccountId,
    target: TargetId,
  ) -> Result<Option<Vote>> {
    let actor_id   = encode_id(actor_id)?;
    let target_str = target.fullname();

    let raw: Option<RawVote> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VOTE_COLUMNS} FROM votes
                 WHERE actor_id = ?1 AND target = ?2"
              ),
              rusqlite::params![actor_id, target_str],
              RawVote::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVote::into_vote).transpose()
  }

  async fn settle_fanout(&self, vote: &Vote) -> Result<()> {
    let actor_id   = encode_id(vote.actor_id)?;
    let target_str = vote.target.fullname();
    let direction  = vote.direction.as_str();
    let date_str   = encode_dt(vote.date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE votes SET fanout_pending = 0
           WHERE actor_id = ?1 AND target = ?2 AND direction = ?3 AND date = ?4",
          rusqlite::params![actor_id, target_str, direction, date_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
