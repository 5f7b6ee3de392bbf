//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that string comparison in SQL matches
//! chronological order. Contacts are stored as a compact JSON array.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use deadtext_core::{
  attempt::{AttemptOutcome, NotificationAttempt},
  state::SubjectState,
  subject::{Contact, Subject, SubjectId},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

/// Drop sub-microsecond digits so an in-memory value equals what a later
/// read decodes.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── SubjectState
// ─────────────────────────────────────────────────────────────

pub fn encode_state(state: SubjectState) -> &'static str { state.as_str() }

pub fn decode_state(s: &str) -> Result<SubjectState> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown subject state: {s:?}")))
}

// ─── Contacts ────────────────────────────────────────────────────────────────

pub fn encode_contacts(contacts: &[Contact]) -> Result<String> {
  Ok(serde_json::to_string(contacts)?)
}

pub fn decode_contacts(s: &str) -> Result<Vec<Contact>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Versions and timeouts ───────────────────────────────────────────────────

pub fn decode_u64(column: &str, v: i64) -> Result<u64> {
  u64::try_from(v)
    .map_err(|_| Error::Decode(format!("negative {column}: {v}")))
}

pub fn encode_u64(column: &str, v: u64) -> Result<i64> {
  i64::try_from(v)
    .map_err(|_| Error::Decode(format!("{column} out of range: {v}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawSubject`].
pub const SUBJECT_COLUMNS: &str = "subject_id, created_at, last_checkin_at, \
   timeout_secs, contacts, state, escalation_sent_at, version";

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:         String,
  pub created_at:         String,
  pub last_checkin_at:    String,
  pub timeout_secs:       i64,
  pub contacts:           String,
  pub state:              String,
  pub escalation_sent_at: Option<String>,
  pub version:            i64,
}

impl RawSubject {
  /// Read a row selected with [`SUBJECT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:         row.get(0)?,
      created_at:         row.get(1)?,
      last_checkin_at:    row.get(2)?,
      timeout_secs:       row.get(3)?,
      contacts:           row.get(4)?,
      state:              row.get(5)?,
      escalation_sent_at: row.get(6)?,
      version:            row.get(7)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:         SubjectId::from(self.subject_id),
      created_at:         decode_dt(&self.created_at)?,
      last_checkin_at:    decode_dt(&self.last_checkin_at)?,
      timeout_secs:       decode_u64("timeout_secs", self.timeout_secs)?,
      contacts:           decode_contacts(&self.contacts)?,
      state:              decode_state(&self.state)?,
      escalation_sent_at: self
        .escalation_sent_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      version:            decode_u64("version", self.version)?,
    })
  }
}

/// A subject encoded for writing. `deadline_at` is derived, never read back.
pub struct SubjectRow {
  pub subject_id:         String,
  pub created_at:         String,
  pub last_checkin_at:    String,
  pub deadline_at:        String,
  pub timeout_secs:       i64,
  pub contacts:           String,
  pub state:              &'static str,
  pub escalation_sent_at: Option<String>,
  pub version:            i64,
}

impl SubjectRow {
  pub fn encode(s: &Subject) -> Result<Self> {
    Ok(Self {
      subject_id:         s.subject_id.as_str().to_owned(),
      created_at:         encode_dt(s.created_at),
      last_checkin_at:    encode_dt(s.last_checkin_at),
      deadline_at:        encode_dt(s.deadline()),
      timeout_secs:       encode_u64("timeout_secs", s.timeout_secs)?,
      contacts:           encode_contacts(&s.contacts)?,
      state:              encode_state(s.state),
      escalation_sent_at: s.escalation_sent_at.map(encode_dt),
      version:            encode_u64("version", s.version)?,
    })
  }
}

/// Raw values read directly from a `notification_attempts` row.
pub struct RawAttempt {
  pub attempt_id:   String,
  pub subject_id:   String,
  pub contact:      String,
  pub attempted_at: String,
  pub outcome:      String,
  pub reason:       Option<String>,
}

impl RawAttempt {
  pub fn into_attempt(self) -> Result<NotificationAttempt> {
    let outcome = match (self.outcome.as_str(), self.reason) {
      ("delivered", _) => AttemptOutcome::Delivered,
      ("timed_out", _) => AttemptOutcome::TimedOut,
      ("failed", reason) => AttemptOutcome::Failed {
        reason: reason.unwrap_or_default(),
      },
      (other, _) => {
        return Err(Error::Decode(format!("unknown outcome: {other:?}")));
      }
    };

    Ok(NotificationAttempt {
      attempt_id: decode_uuid(&self.attempt_id)?,
      subject_id: SubjectId::from(self.subject_id),
      contact: Contact::from(self.contact),
      attempted_at: decode_dt(&self.attempted_at)?,
      outcome,
    })
  }
}
