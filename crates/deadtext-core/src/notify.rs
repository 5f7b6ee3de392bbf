//! The `Notifier` capability and the escalation message it carries.
//!
//! The transport behind a notifier (SMS, chat API, webhook, email) is not
//! this crate's concern. Implementations live with the binary that wires
//! them up.

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  subject::{Contact, Subject, SubjectId},
};

/// Default body used when no template is configured.
pub const DEFAULT_TEMPLATE: &str =
  "{subject} has not checked in since {last_checkin}.";

/// The message delivered to each contact of an escalated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationMessage {
  pub subject_id:      SubjectId,
  pub last_checkin_at: DateTime<Utc>,
  pub text:            String,
}

impl EscalationMessage {
  /// Render `template` for `subject`.
  ///
  /// Recognised placeholders: `{subject}`, `{last_checkin}` (RFC 3339) and
  /// `{timeout}` (seconds). Anything else is copied through.
  pub fn render(template: &str, subject: &Subject) -> Self {
    let text = template
      .replace("{subject}", subject.subject_id.as_str())
      .replace(
        "{last_checkin}",
        &subject
          .last_checkin_at
          .to_rfc3339_opts(SecondsFormat::Secs, true),
      )
      .replace("{timeout}", &subject.timeout_secs.to_string());

    Self {
      subject_id: subject.subject_id.clone(),
      last_checkin_at: subject.last_checkin_at,
      text,
    }
  }
}

/// Delivers an escalation message to one contact.
///
/// A returned error means this delivery failed; callers move on to the next
/// contact regardless. Implementations should fail with
/// [`crate::Error::NotifierFailure`].
pub trait Notifier: Send + Sync {
  fn notify<'a>(
    &'a self,
    contact: &'a Contact,
    message: &'a EscalationMessage,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;
  use crate::subject::NewSubject;

  #[test]
  fn renders_placeholders() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let subject = NewSubject::new("alice", 3600, ["bob"])
      .into_subject(at)
      .unwrap();

    let msg = EscalationMessage::render(
      "{subject} silent since {last_checkin} (limit {timeout}s) {other}",
      &subject,
    );
    assert_eq!(
      msg.text,
      "alice silent since 2024-03-01T12:00:00Z (limit 3600s) {other}"
    );
    assert_eq!(msg.subject_id, subject.subject_id);
  }

  #[test]
  fn default_template_mentions_subject() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let subject = NewSubject::new("alice", 60, ["bob"])
      .into_subject(at)
      .unwrap();
    let msg = EscalationMessage::render(DEFAULT_TEMPLATE, &subject);
    assert!(msg.text.starts_with("alice has not checked in"));
  }
}
