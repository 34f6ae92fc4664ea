//! Extension points for collaborators outside the voting pipeline.
//!
//! Each point holds zero or more handlers, called in registration order.
//! `vote.get_vote_data` lets every handler enrich the data of a vote being
//! submitted. `vote.validate_vote_data` short-circuits: the first handler to
//! return `Some(_)` decides, and `Some(false)` marks the message as corrupt.

use std::fmt;

use crate::{context::RequestContext, thing::{Account, Target}, vote::VoteData};

pub const GET_VOTE_DATA: &str = "vote.get_vote_data";
pub const VALIDATE_VOTE_DATA: &str = "vote.validate_vote_data";

/// Arguments to `vote.get_vote_data` handlers.
pub struct VoteDataArgs<'a> {
  pub data:    &'a mut VoteData,
  pub actor:   &'a Account,
  pub target:  &'a Target,
  pub request: &'a RequestContext,
}

/// Arguments to `vote.validate_vote_data` handlers.
pub struct ValidateArgs<'a> {
  /// The parsed, not yet typed, message body.
  pub vote_data: &'a serde_json::Value,
  pub queue:     &'a str,
  pub attempts:  u32,
}

type EnrichHandler = Box<dyn Fn(&mut VoteDataArgs<'_>) + Send + Sync>;
type ValidateHandler = Box<dyn Fn(&ValidateArgs<'_>) -> Option<bool> + Send + Sync>;

#[derive(Default)]
pub struct HookRegistry {
  get_vote_data:      Vec<EnrichHandler>,
  validate_vote_data: Vec<ValidateHandler>,
}

impl fmt::Debug for HookRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HookRegistry")
      .field(GET_VOTE_DATA, &self.get_vote_data.len())
      .field(VALIDATE_VOTE_DATA, &self.validate_vote_data.len())
      .finish()
  }
}

impl HookRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn on_get_vote_data(
    &mut self,
    handler: impl Fn(&mut VoteDataArgs<'_>) + Send + Sync + 'static,
  ) -> &mut Self {
    self.get_vote_data.push(Box::new(handler));
    self
  }

  pub fn on_validate_vote_data(
    &mut self,
    handler: impl Fn(&ValidateArgs<'_>) -> Option<bool> + Send + Sync + 'static,
  ) -> &mut Self {
    self.validate_vote_data.push(Box::new(handler));
    self
  }

  /// Run every `vote.get_vote_data` handler.
  pub fn call_get_vote_data(&self, args: &mut VoteDataArgs<'_>) {
    for handler in &self.get_vote_data {
      handler(args);
    }
  }

  /// Run `vote.validate_vote_data` handlers until one returns a verdict.
  pub fn validate_vote_data(&self, args: &ValidateArgs<'_>) -> Option<bool> {
    self.validate_vote_data.iter().find_map(|handler| handler(args))
  }
}
