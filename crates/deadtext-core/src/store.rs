//! The `CheckinStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `deadtext-store-sqlite`). The engine and the API depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, StoreError,
  attempt::NotificationAttempt,
  state::SubjectState,
  subject::{Contact, NewSubject, Subject, SubjectId},
};

// ─── Due paging ──────────────────────────────────────────────────────────────

/// Position in the due sequence: the last subject of the previous page.
///
/// The sequence is ordered by `last_checkin_at` ascending, then by
/// `subject_id` ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueCursor {
  pub last_checkin_at: DateTime<Utc>,
  pub subject_id:      SubjectId,
}

impl From<&Subject> for DueCursor {
  fn from(s: &Subject) -> Self {
    Self {
      last_checkin_at: s.last_checkin_at,
      subject_id:      s.subject_id.clone(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a check-in store backend.
///
/// Every mutating method is atomic and durable: it either commits the whole
/// change before returning `Ok`, or leaves the record as it was.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait CheckinStore: Send + Sync {
  type Error: StoreError + From<Error>;

  // ── Registration ──────────────────────────────────────────────────────

  /// Create a subject in [`SubjectState::Active`] with
  /// `last_checkin_at = at`. Fails with `AlreadyExists` if the id is taken.
  fn register(
    &self,
    input: NewSubject,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Remove a subject and its attempt log. Succeeds if it is already gone.
  fn deregister<'a>(
    &'a self,
    subject_id: &'a SubjectId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch a subject; fails with `NotFound` if unknown.
  fn get<'a>(
    &'a self,
    subject_id: &'a SubjectId,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  /// All subjects, ordered by id.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// One page of non-disabled subjects whose silence at `as_of` has reached
  /// their timeout, strictly after `after`, oldest check-in first.
  fn list_due<'a>(
    &'a self,
    as_of: DateTime<Utc>,
    after: Option<&'a DueCursor>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Record a check-in; see [`Subject::check_in`].
  fn check_in<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  /// Apply a validated transition; see [`Subject::transition`].
  fn set_state<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    new_state: SubjectState,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  /// Like [`set_state`](Self::set_state), but fails with `Conflict` unless
  /// the stored record is still at `expected_version`.
  fn set_state_if<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    expected_version: u64,
    new_state: SubjectState,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  /// Stamp `escalation_sent_at` on an escalated or acknowledged subject.
  fn mark_escalation_sent<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  /// Replace the ordered contact list.
  fn set_contacts<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    contacts: Vec<Contact>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a;

  // ── Attempt log ───────────────────────────────────────────────────────

  fn record_attempt(
    &self,
    attempt: NotificationAttempt,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Attempts for one subject, oldest first.
  fn list_attempts<'a>(
    &'a self,
    subject_id: &'a SubjectId,
  ) -> impl Future<Output = Result<Vec<NotificationAttempt>, Self::Error>>
  + Send
  + 'a;

  // ── Administrative shorthands ─────────────────────────────────────────

  /// A contact acknowledges an escalation: ESCALATED -> ACKNOWLEDGED.
  ///
  /// The contact must be registered for the subject.
  fn acknowledge<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    contact: &'a Contact,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a {
    async move {
      let subject = self.get(subject_id).await?;
      if !subject.contacts.contains(contact) {
        return Err(
          Error::UnknownContact {
            subject_id: subject_id.clone(),
            contact:    contact.clone(),
          }
          .into(),
        );
      }
      self
        .set_state_if(subject_id, subject.version, SubjectState::Acknowledged, at)
        .await
    }
  }

  /// Exclude a subject from evaluation.
  fn disable<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a {
    self.set_state(subject_id, SubjectState::Disabled, at)
  }

  /// Bring a disabled subject back; the timer restarts at `at`.
  fn enable<'a>(
    &'a self,
    subject_id: &'a SubjectId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + 'a {
    async move {
      let subject = self.get(subject_id).await?;
      if subject.state != SubjectState::Disabled {
        return Err(
          Error::InvalidTransition {
            subject_id: subject_id.clone(),
            from:       subject.state,
            to:         SubjectState::Active,
          }
          .into(),
        );
      }
      self
        .set_state_if(subject_id, subject.version, SubjectState::Active, at)
        .await
    }
  }
}

// ─── DueSubjects ─────────────────────────────────────────────────────────────

/// Lazy, finite walk over the due sequence at a fixed `as_of`.
///
/// Pages are fetched on demand. Build a new walker to restart from the
/// beginning.
pub struct DueSubjects<'a, S: ?Sized> {
  store:     &'a S,
  as_of:     DateTime<Utc>,
  page_size: usize,
  cursor:    Option<DueCursor>,
  done:      bool,
}

impl<'a, S: CheckinStore + ?Sized> DueSubjects<'a, S> {
  pub fn new(store: &'a S, as_of: DateTime<Utc>, page_size: usize) -> Self {
    Self {
      store,
      as_of,
      page_size: page_size.max(1),
      cursor: None,
      done: false,
    }
  }

  /// The next non-empty page, or `None` once the sequence is exhausted.
  pub async fn next_page(&mut self) -> Result<Option<Vec<Subject>>, S::Error> {
    if self.done {
      return Ok(None);
    }

    let page = self
      .store
      .list_due(self.as_of, self.cursor.as_ref(), self.page_size)
      .await?;

    if page.len() < self.page_size {
      self.done = true;
    }
    match page.last() {
      Some(last) => self.cursor = Some(DueCursor::from(last)),
      None => return Ok(None),
    }
    Ok(Some(page))
  }

  /// Drain the remaining pages into one vector.
  pub async fn collect_all(mut self) -> Result<Vec<Subject>, S::Error> {
    let mut all = Vec::new();
    while let Some(page) = self.next_page().await? {
      all.extend(page);
    }
    Ok(all)
  }
}
