//! Core types and trait definitions for the Ballot vote pipeline.
//!
//! This crate is deliberately free of queue, cache and database
//! dependencies. Storage backends and the worker depend on it.

// Native `async fn` in traits; the traits spell out their `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod context;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod id;
pub mod listing;
pub mod queue;
pub mod shard;
pub mod store;
pub mod thing;
pub mod vote;

pub use error::{Error, Result};
