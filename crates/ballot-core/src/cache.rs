//! Key-value cache and the lock service.

use std::{future::Future, time::Duration};

pub trait Cache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `value` under `key`, expiring after `ttl` (never, if `None`).
  fn set<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
    ttl: Option<Duration>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `None` when absent or expired.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}

/// Mutual exclusion keyed by `(namespace, key)`.
///
/// The lock is held for as long as the returned guard lives, and released
/// when it is dropped, including on early return and unwinding.
pub trait LockService: Send + Sync {
  type Guard: Send;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Wait at most `timeout` for the lock.
  fn acquire<'a>(
    &'a self,
    namespace: &'a str,
    key: &'a str,
    timeout: Duration,
  ) -> impl Future<Output = Result<Self::Guard, Self::Error>> + Send + 'a;
}
