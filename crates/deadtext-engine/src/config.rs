//! Engine tuning knobs.

use std::time::Duration;

use chrono::TimeDelta;
use deadtext_core::notify::DEFAULT_TEMPLATE;

/// Settings shared by every subject.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Buffer between timeout expiry and escalation.
  pub grace_period:      TimeDelta,
  /// Ceiling for a single notifier call.
  pub notify_timeout:    Duration,
  /// Re-escalate acknowledged subjects after this long; `None` never does.
  pub renotify_interval: Option<TimeDelta>,
  /// Subjects fetched per store round-trip.
  pub page_size:         usize,
  /// Escalation message body; see
  /// [`EscalationMessage::render`](deadtext_core::notify::EscalationMessage::render).
  pub message_template:  String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      grace_period:      TimeDelta::minutes(5),
      notify_timeout:    Duration::from_secs(10),
      renotify_interval: None,
      page_size:         100,
      message_template:  DEFAULT_TEMPLATE.to_owned(),
    }
  }
}
