//! Error type for `ballot-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ballot_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown vote direction: {0:?}")]
  UnknownDirection(String),

  #[error("id {0} does not fit in an SQLite integer")]
  IdOutOfRange(u64),

  #[error("negative id in database: {0}")]
  NegativeId(i64),

  #[error("timed out after {timeout:?} waiting for lock {namespace}/{key}")]
  LockTimeout {
    namespace: String,
    key:       String,
    timeout:   std::time::Duration,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
