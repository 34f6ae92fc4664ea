//! SQLite backend for the Ballot storage collaborators.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. One [`SqliteStore`] implements
//! content lookup, the vote store, the listing store, the cache, the lock
//! service and the durable queue.

mod cache;
mod encode;
mod lock;
mod queue;
mod schema;
mod store;
mod vote;

pub mod error;

pub use error::{Error, Result};
pub use lock::{DEFAULT_LOCK_LEASE, SqliteLockGuard};
pub use store::{DEFAULT_QUEUE_LEASE, SqliteStore};

#[cfg(test)]
mod tests;
