//! The Ballot vote pipeline.
//!
//! Votes enter through [`submit::VoteSubmitter`], which records a
//! short-lived intent and hands the vote to a durable queue. A
//! [`commit::VoteConsumer`] per votable kind commits queued votes under the
//! `(actor, target)` lock and fans them out to the derived-listing queues,
//! which [`listing::ListingConsumer`]s drain in batches.

pub mod commit;
pub mod config;
pub mod error;
pub mod fanout;
pub mod intent;
pub mod listing;
pub mod lock;
pub mod runner;
pub mod submit;
pub mod timer;

#[cfg(test)]
mod testing;

pub use crate::config::WorkerConfig;
pub use error::{ConsumeError, SubmitError};
