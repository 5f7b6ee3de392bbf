//! Error types for `deadtext-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
  state::SubjectState,
  subject::{Contact, SubjectId},
};

/// Coarse classification shared by every error that can cross the store
/// boundary. The engine and the API branch on this instead of on concrete
/// backend error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  AlreadyExists,
  InvalidTransition,
  StaleCheckin,
  Conflict,
  InvalidInput,
  NotifierFailure,
  StoreUnavailable,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  NotFound(SubjectId),

  #[error("subject already registered: {0}")]
  AlreadyExists(SubjectId),

  #[error("subject {subject_id}: transition {from} -> {to} is not allowed")]
  InvalidTransition {
    subject_id: SubjectId,
    from:       SubjectState,
    to:         SubjectState,
  },

  #[error("subject {0} has no contacts to escalate to")]
  NoContacts(SubjectId),

  #[error(
    "stale check-in for {subject_id}: {at} is older than {last_checkin_at}"
  )]
  StaleCheckin {
    subject_id:      SubjectId,
    at:              DateTime<Utc>,
    last_checkin_at: DateTime<Utc>,
  },

  #[error(
    "subject {subject_id} changed concurrently (expected version {expected}, \
     found {found})"
  )]
  Conflict {
    subject_id: SubjectId,
    expected:   u64,
    found:      u64,
  },

  /// A check-in or disable moved the subject out of escalation before the
  /// dispatch could be stamped.
  #[error("subject {subject_id} left escalation (now {state}) before it was stamped")]
  EscalationWithdrawn {
    subject_id: SubjectId,
    state:      SubjectState,
  },

  #[error("{contact} is not a contact of subject {subject_id}")]
  UnknownContact {
    subject_id: SubjectId,
    contact:    Contact,
  },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("notifier failed for {contact}: {reason}")]
  NotifierFailure { contact: Contact, reason: String },

  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by every store backend error so callers can classify failures
/// without depending on the backend crate.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
      Self::InvalidTransition { .. } | Self::NoContacts(_) => {
        ErrorKind::InvalidTransition
      }
      Self::StaleCheckin { .. } => ErrorKind::StaleCheckin,
      Self::Conflict { .. } | Self::EscalationWithdrawn { .. } => {
        ErrorKind::Conflict
      }
      Self::UnknownContact { .. } | Self::InvalidInput(_) => {
        ErrorKind::InvalidInput
      }
      Self::NotifierFailure { .. } => ErrorKind::NotifierFailure,
      Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable
    }
  }
}
