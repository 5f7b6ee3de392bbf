//! Subject: a tracked entity whose liveness is confirmed by check-ins.
//!
//! The mutation rules live here as plain methods on [`Subject`]. Store
//! backends load a record, apply one of these methods and write the result
//! back inside a single transaction, so every backend shares one definition
//! of what a check-in or a transition does.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, state::SubjectState};

/// Longest accepted timeout: one hundred years.
pub const MAX_TIMEOUT_SECS: u64 = 100 * 365 * 24 * 60 * 60;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Opaque subject identifier, typically a chat or user id.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SubjectId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for SubjectId {
  fn from(s: String) -> Self { Self(s) }
}

/// A notification target. The format is whatever the configured notifier
/// understands (a phone number, a chat id, an address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contact(String);

impl Contact {
  pub fn new(contact: impl Into<String>) -> Self { Self(contact.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Contact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Contact {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for Contact {
  fn from(s: String) -> Self { Self(s) }
}

/// Reject blank or repeated contacts.
pub fn validate_contacts(contacts: &[Contact]) -> Result<()> {
  let mut seen = HashSet::with_capacity(contacts.len());
  for contact in contacts {
    if contact.as_str().trim().is_empty() {
      return Err(Error::InvalidInput("contact must not be blank".into()));
    }
    if !seen.insert(contact) {
      return Err(Error::InvalidInput(format!(
        "duplicate contact: {contact}"
      )));
    }
  }
  Ok(())
}

// ─── NewSubject ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::CheckinStore::register`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
  pub subject_id:   SubjectId,
  pub timeout_secs: u64,
  /// Escalation order; the first contact is notified first.
  pub contacts:     Vec<Contact>,
}

impl NewSubject {
  pub fn new(
    subject_id: impl Into<SubjectId>,
    timeout_secs: u64,
    contacts: impl IntoIterator<Item = impl Into<Contact>>,
  ) -> Self {
    Self {
      subject_id: subject_id.into(),
      timeout_secs,
      contacts: contacts.into_iter().map(Into::into).collect(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.subject_id.as_str().trim().is_empty() {
      return Err(Error::InvalidInput("subject id must not be blank".into()));
    }
    if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
      return Err(Error::InvalidInput(format!(
        "timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"
      )));
    }
    validate_contacts(&self.contacts)
  }

  /// Build the freshly registered record.
  pub fn into_subject(self, at: DateTime<Utc>) -> Result<Subject> {
    self.validate()?;
    Ok(Subject {
      subject_id:         self.subject_id,
      created_at:         at,
      last_checkin_at:    at,
      timeout_secs:       self.timeout_secs,
      contacts:           self.contacts,
      state:              SubjectState::Active,
      escalation_sent_at: None,
      version:            1,
    })
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:         SubjectId,
  pub created_at:         DateTime<Utc>,
  /// Never moves backwards.
  pub last_checkin_at:    DateTime<Utc>,
  pub timeout_secs:       u64,
  pub contacts:           Vec<Contact>,
  pub state:              SubjectState,
  /// Set after an escalation batch has been dispatched; cleared on return
  /// to [`SubjectState::Active`].
  pub escalation_sent_at: Option<DateTime<Utc>>,
  /// Bumped on every mutation; compare-and-swap writes check it.
  pub version:            u64,
}

impl Subject {
  pub fn timeout(&self) -> TimeDelta {
    // `timeout_secs` is bounded by MAX_TIMEOUT_SECS at registration.
    TimeDelta::seconds(self.timeout_secs.min(MAX_TIMEOUT_SECS) as i64)
  }

  /// The instant at which the subject becomes due.
  pub fn deadline(&self) -> DateTime<Utc> {
    self.last_checkin_at + self.timeout()
  }

  /// Silence since the last check-in, as seen at `now`.
  pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
    now - self.last_checkin_at
  }

  /// Whether the scheduler should look at this subject at `as_of`.
  pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
    self.state != SubjectState::Disabled && self.elapsed(as_of) >= self.timeout()
  }

  /// Record a liveness confirmation at `at`.
  ///
  /// An `at` older than the stored check-in is rejected and leaves the
  /// record untouched. Grace, escalated and acknowledged subjects return to
  /// active; disabled subjects only have their timestamp advanced.
  pub fn check_in(&mut self, at: DateTime<Utc>) -> Result<()> {
    if at < self.last_checkin_at {
      return Err(Error::StaleCheckin {
        subject_id:      self.subject_id.clone(),
        at,
        last_checkin_at: self.last_checkin_at,
      });
    }

    self.last_checkin_at = at;
    if self.state.resets_on_checkin() {
      self.state = SubjectState::Active;
      self.escalation_sent_at = None;
    }
    self.version += 1;
    Ok(())
  }

  /// Apply a validated state transition.
  pub fn transition(&mut self, to: SubjectState, at: DateTime<Utc>) -> Result<()> {
    let from = self.state;
    if !from.can_transition_to(to) {
      return Err(Error::InvalidTransition {
        subject_id: self.subject_id.clone(),
        from,
        to,
      });
    }

    match to {
      SubjectState::Escalated => {
        if self.contacts.is_empty() {
          return Err(Error::NoContacts(self.subject_id.clone()));
        }
        // Pending until the dispatch for this entry has happened.
        self.escalation_sent_at = None;
      }
      SubjectState::Active => {
        self.escalation_sent_at = None;
        // Re-enabling restarts the timer.
        if from == SubjectState::Disabled && at > self.last_checkin_at {
          self.last_checkin_at = at;
        }
      }
      SubjectState::Grace
      | SubjectState::Acknowledged
      | SubjectState::Disabled => {}
    }

    self.state = to;
    self.version += 1;
    Ok(())
  }

  /// Stamp the completion of an escalation batch.
  ///
  /// A contact may acknowledge while the batch is still going out, so an
  /// acknowledged subject takes the stamp too.
  pub fn mark_escalation_sent(&mut self, at: DateTime<Utc>) -> Result<()> {
    if !matches!(
      self.state,
      SubjectState::Escalated | SubjectState::Acknowledged
    ) {
      return Err(Error::EscalationWithdrawn {
        subject_id: self.subject_id.clone(),
        state:      self.state,
      });
    }
    self.escalation_sent_at = Some(at);
    self.version += 1;
    Ok(())
  }

  /// Replace the contact list.
  pub fn set_contacts(&mut self, contacts: Vec<Contact>) -> Result<()> {
    validate_contacts(&contacts)?;
    self.contacts = contacts;
    self.version += 1;
    Ok(())
  }
}
