//! A cache and queue whose writes can be switched off, for exercising the
//! failure paths of the submitter and the intent recorder.

use std::{sync::Mutex, time::Duration};

use thiserror::Error;

use ballot_core::{
  cache::Cache,
  queue::{Delivery, QueueTransport},
};

#[derive(Debug, Error)]
#[error("backend unavailable")]
pub struct Unavailable;

/// Keeps accepted enqueues in memory; never has anything to consume.
#[derive(Default)]
pub struct Flaky {
  cache_down: bool,
  queue_down: bool,
  enqueued:   Mutex<Vec<(String, String)>>,
}

impl Flaky {
  pub fn cache_down() -> Self { Self { cache_down: true, ..Self::default() } }

  pub fn queue_down() -> Self { Self { queue_down: true, ..Self::default() } }

  pub fn enqueued(&self) -> Vec<(String, String)> {
    self.enqueued.lock().map(|q| q.clone()).unwrap_or_default()
  }
}

impl Cache for Flaky {
  type Error = Unavailable;

  async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), Unavailable> {
    if self.cache_down { Err(Unavailable) } else { Ok(()) }
  }

  async fn get(&self, _key: &str) -> Result<Option<String>, Unavailable> {
    if self.cache_down { Err(Unavailable) } else { Ok(None) }
  }
}

impl QueueTransport for Flaky {
  type Error = Unavailable;

  async fn enqueue(&self, queue: &str, payload: &str) -> Result<(), Unavailable> {
    if self.queue_down {
      return Err(Unavailable);
    }
    if let Ok(mut q) = self.enqueued.lock() {
      q.push((queue.to_owned(), payload.to_owned()));
    }
    Ok(())
  }

  async fn consume_one(&self, _queue: &str) -> Result<Option<Delivery>, Unavailable> {
    Ok(None)
  }

  async fn consume_batch(&self, _queue: &str, _limit: usize) -> Result<Vec<Delivery>, Unavailable> {
    Ok(Vec::new())
  }

  async fn ack(&self, _delivery: &Delivery) -> Result<(), Unavailable> { Ok(()) }

  async fn nack(&self, _delivery: &Delivery) -> Result<(), Unavailable> { Ok(()) }
}
