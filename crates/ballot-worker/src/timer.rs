//! Per-message phase timings, reported through `tracing`.

use std::time::{Duration, Instant};

/// Measures consecutive phases of one unit of work.
#[derive(Debug)]
pub struct PhaseTimer {
  name:    String,
  started: Instant,
  last:    Instant,
  phases:  Vec<(&'static str, Duration)>,
}

/// What a [`PhaseTimer`] measured.
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
  pub name:   String,
  pub phases: Vec<(&'static str, Duration)>,
  pub total:  Duration,
}

impl Timings {
  pub fn phase(&self, name: &str) -> Option<Duration> {
    self
      .phases
      .iter()
      .find(|(phase, _)| *phase == name)
      .map(|(_, d)| *d)
  }
}

impl PhaseTimer {
  pub fn start(name: impl Into<String>) -> Self {
    let now = Instant::now();
    Self { name: name.into(), started: now, last: now, phases: Vec::new() }
  }

  /// Close the current phase under `phase` and start the next one.
  pub fn mark(&mut self, phase: &'static str) {
    let now = Instant::now();
    self.phases.push((phase, now - self.last));
    self.last = now;
  }

  /// Report the timings and return them.
  pub fn finish(self) -> Timings {
    let total = self.started.elapsed();
    for (phase, elapsed) in &self.phases {
      tracing::debug!(
        timer = %self.name,
        phase,
        elapsed_us = elapsed.as_micros() as u64,
        "phase timing"
      );
    }
    tracing::debug!(
      timer = %self.name,
      total_us = total.as_micros() as u64,
      "timer flushed"
    );
    Timings { name: self.name, phases: self.phases, total }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phases_are_recorded_in_order() {
    let mut timer = PhaseTimer::start("vote_link_q");
    timer.mark("create_vote_object");
    timer.mark("voter_likes");
    let timings = timer.finish();

    let names: Vec<_> = timings.phases.iter().map(|(p, _)| *p).collect();
    assert_eq!(names, vec!["create_vote_object", "voter_likes"]);
    assert!(timings.phase("author_queries").is_none());
    assert!(timings.total >= timings.phase("voter_likes").unwrap());
  }
}
