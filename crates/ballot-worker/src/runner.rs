//! The polling loop shared by every consumer.

use std::{future::Future, time::Duration};

use tokio::sync::watch;

use crate::error::ConsumeError;

/// Call `poll` until `shutdown` flips to `true` or its sender goes away.
///
/// `poll` reports whether it found work. After an empty or failed poll the
/// loop sleeps for `poll_interval`, waking early on shutdown. Shutdown is
/// only observed between polls, so a message is never abandoned halfway.
pub async fn run_until_shutdown<F, Fut>(
  name: &str,
  poll_interval: Duration,
  mut shutdown: watch::Receiver<bool>,
  mut poll: F,
) where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<bool, ConsumeError>>,
{
  tracing::info!(consumer = name, "consumer started");
  loop {
    if *shutdown.borrow_and_update() {
      break;
    }

    let idle = match poll().await {
      Ok(found) => !found,
      Err(e) => {
        tracing::error!(consumer = name, error = %e, "poll failed");
        true
      }
    };

    if idle {
      tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        changed = shutdown.changed() => {
          if changed.is_err() {
            break;
          }
        }
      }
    }
  }
  tracing::info!(consumer = name, "consumer stopped");
}
