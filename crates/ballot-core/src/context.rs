//! Request context captured on the synchronous submission path.
//!
//! Votes are committed later by a queue consumer that runs outside any
//! request. Everything the consumer (or analytics downstream of it) needs to
//! know about the originating request is therefore captured here and carried
//! inside the queued message.

use std::{future::Future, net::IpAddr};

use serde::{Deserialize, Serialize};

use crate::id::AccountId;

/// Non-sensitive request/session context for deferred event emission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
  pub actor_id:   Option<AccountId>,
  pub actor_name: Option<String>,
  pub locale:     Option<String>,
  pub timezone:   Option<String>,
  pub user_agent: Option<String>,
  pub referrer:   Option<String>,
  pub domain:     Option<String>,
}

/// Context that must not be logged or exposed beyond the event pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveContext {
  pub ip:         Option<IpAddr>,
  pub session_id: Option<String>,
}

/// Snapshot attached to a vote message as `event_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
  pub context:   EventContext,
  pub sensitive: SensitiveContext,
}

/// The explicit stand-in for per-request globals.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  /// Source network address of the request, if known.
  pub ip:          Option<IpAddr>,
  /// `false` for batch jobs and scripts, which have no session to snapshot.
  pub interactive: bool,
  pub session_id:  Option<String>,
  pub event:       EventContext,
}

impl RequestContext {
  /// Context for votes cast by scripts and batch jobs.
  pub fn script() -> Self { Self::default() }

  /// Snapshot for deferred event emission. `None` outside interactive
  /// requests.
  pub fn event_data(&self) -> Option<EventData> {
    if !self.interactive {
      return None;
    }
    Some(EventData {
      context:   self.event.clone(),
      sensitive: SensitiveContext {
        ip:         self.ip,
        session_id: self.session_id.clone(),
      },
    })
  }
}

/// IP-to-organisation attribution (geolocation provider).
pub trait OrgResolver: Send + Sync {
  fn organization_for(
    &self,
    ip: IpAddr,
  ) -> impl Future<Output = Option<String>> + Send + '_;
}

/// Resolver used when no geolocation provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOrgResolver;

impl OrgResolver for NoOrgResolver {
  async fn organization_for(&self, _ip: IpAddr) -> Option<String> { None }
}
