//! Pure evaluation: what should happen to one subject at `now`.

use chrono::{DateTime, Utc};
use deadtext_core::{state::SubjectState, subject::Subject};

use crate::EngineConfig;

/// One action for a subject. A plan is applied front to back and stops at
/// the first step that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Transition(SubjectState),
  /// Notify every contact in order, then stamp `escalation_sent_at`.
  Dispatch,
}

/// Decide the steps for `subject` at `now`.
///
/// Silence below the timeout needs nothing; at the timeout the subject
/// enters grace; at timeout plus grace it escalates. An active subject that
/// is already past both thresholds walks through grace within the same plan.
pub fn plan(subject: &Subject, now: DateTime<Utc>, config: &EngineConfig) -> Vec<Step> {
  use SubjectState::*;

  let elapsed = subject.elapsed(now);
  let timeout = subject.timeout();
  let past_timeout = elapsed >= timeout;
  let past_grace = elapsed >= timeout + config.grace_period;

  match subject.state {
    Active if past_grace => {
      vec![Step::Transition(Grace), Step::Transition(Escalated), Step::Dispatch]
    }
    Active if past_timeout => vec![Step::Transition(Grace)],
    Grace if past_grace => vec![Step::Transition(Escalated), Step::Dispatch],
    // Escalated but never stamped: the dispatch for this entry is pending.
    Escalated if subject.escalation_sent_at.is_none() => vec![Step::Dispatch],
    Acknowledged => match config.renotify_interval {
      Some(interval) => {
        let since = subject
          .escalation_sent_at
          .unwrap_or_else(|| subject.deadline() + config.grace_period);
        if now - since >= interval {
          vec![Step::Transition(Escalated), Step::Dispatch]
        } else {
          Vec::new()
        }
      }
      None => Vec::new(),
    },
    Active | Grace | Escalated | Disabled => Vec::new(),
  }
}
