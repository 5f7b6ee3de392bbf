//! Notification attempts: the append-only log of escalation dispatches.
//!
//! One record per notifier call, whatever the outcome. Attempts are never
//! updated; they are only removed together with their subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::{Contact, SubjectId};

/// How a single notifier call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
  Delivered,
  Failed { reason: String },
  /// The notifier did not answer within the configured ceiling.
  TimedOut,
}

impl AttemptOutcome {
  pub fn is_delivered(&self) -> bool { matches!(self, Self::Delivered) }

  /// The discriminant stored in the `outcome` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Delivered => "delivered",
      Self::Failed { .. } => "failed",
      Self::TimedOut => "timed_out",
    }
  }

  /// The failure reason, if any, for the `reason` column.
  pub fn reason(&self) -> Option<&str> {
    match self {
      Self::Failed { reason } => Some(reason),
      Self::Delivered | Self::TimedOut => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAttempt {
  pub attempt_id:   Uuid,
  pub subject_id:   SubjectId,
  pub contact:      Contact,
  pub attempted_at: DateTime<Utc>,
  #[serde(flatten)]
  pub outcome:      AttemptOutcome,
}

impl NotificationAttempt {
  pub fn new(
    subject_id: SubjectId,
    contact: Contact,
    attempted_at: DateTime<Utc>,
    outcome: AttemptOutcome,
  ) -> Self {
    Self {
      attempt_id: Uuid::new_v4(),
      subject_id,
      contact,
      attempted_at,
      outcome,
    }
  }
}
