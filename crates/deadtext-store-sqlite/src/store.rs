//! [`SqliteStore`]: the SQLite implementation of [`CheckinStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use deadtext_core::{
  attempt::NotificationAttempt,
  state::SubjectState,
  store::{CheckinStore, DueCursor},
  subject::{Contact, NewSubject, Subject, SubjectId},
};

use crate::{
  Error, Result,
  encode::{
    RawAttempt, RawSubject, SUBJECT_COLUMNS, SubjectRow, encode_dt,
    encode_state, encode_uuid, stored_precision,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A check-in store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened check-in store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load one subject, let `f` mutate it, and write it back, all inside a
  /// single transaction. Nothing is written if any step fails.
  ///
  /// With `expected_version` set, the write is a compare-and-swap against
  /// the stored version.
  async fn update<F>(
    &self,
    subject_id: &SubjectId,
    expected_version: Option<u64>,
    f: F,
  ) -> Result<Subject>
  where
    F: FnOnce(&mut Subject) -> deadtext_core::Result<()> + Send + 'static,
  {
    let id = subject_id.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = update_in_tx(&tx, &id, expected_version, f);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn load_subject(
  conn: &rusqlite::Connection,
  subject_id: &SubjectId,
) -> Result<Option<Subject>> {
  let raw = conn
    .query_row(
      &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
      rusqlite::params![subject_id.as_str()],
      RawSubject::from_row,
    )
    .optional()?;

  raw.map(RawSubject::into_subject).transpose()
}

fn insert_subject(
  conn: &rusqlite::Connection,
  row: &SubjectRow,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO subjects (
       subject_id, created_at, last_checkin_at, deadline_at, timeout_secs,
       contacts, state, escalation_sent_at, version
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      row.subject_id,
      row.created_at,
      row.last_checkin_at,
      row.deadline_at,
      row.timeout_secs,
      row.contacts,
      row.state,
      row.escalation_sent_at,
      row.version,
    ],
  )?;
  Ok(())
}

fn write_subject(
  conn: &rusqlite::Connection,
  row: &SubjectRow,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE subjects SET
       last_checkin_at    = ?2,
       deadline_at        = ?3,
       timeout_secs       = ?4,
       contacts           = ?5,
       state              = ?6,
       escalation_sent_at = ?7,
       version            = ?8
     WHERE subject_id = ?1",
    rusqlite::params![
      row.subject_id,
      row.last_checkin_at,
      row.deadline_at,
      row.timeout_secs,
      row.contacts,
      row.state,
      row.escalation_sent_at,
      row.version,
    ],
  )?;
  Ok(())
}

fn update_in_tx<F>(
  conn: &rusqlite::Connection,
  subject_id: &SubjectId,
  expected_version: Option<u64>,
  f: F,
) -> Result<Subject>
where
  F: FnOnce(&mut Subject) -> deadtext_core::Result<()>,
{
  let mut subject = load_subject(conn, subject_id)?
    .ok_or_else(|| deadtext_core::Error::NotFound(subject_id.clone()))?;

  if let Some(expected) = expected_version
    && subject.version != expected
  {
    return Err(
      deadtext_core::Error::Conflict {
        subject_id: subject_id.clone(),
        expected,
        found: subject.version,
      }
      .into(),
    );
  }

  f(&mut subject)?;
  write_subject(conn, &SubjectRow::encode(&subject)?)?;
  Ok(subject)
}

// ─── CheckinStore impl ───────────────────────────────────────────────────────

impl CheckinStore for SqliteStore {
  type Error = Error;

  // ── Registration ──────────────────────────────────────────────────────────

  async fn register(&self, input: NewSubject, at: DateTime<Utc>) -> Result<Subject> {
    let subject = input.into_subject(stored_precision(at))?;
    let row = SubjectRow::encode(&subject)?;
    let id = subject.subject_id.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![row.subject_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if exists {
          return Ok(Err(deadtext_core::Error::AlreadyExists(id)));
        }

        insert_subject(&tx, &row)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    Ok(subject)
  }

  async fn deregister(&self, subject_id: &SubjectId) -> Result<()> {
    let id_str = subject_id.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM notification_attempts WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get(&self, subject_id: &SubjectId) -> Result<Subject> {
    let id = subject_id.clone();

    let found = self
      .conn
      .call(move |conn| Ok(load_subject(conn, &id)))
      .await??;

    found.ok_or_else(|| deadtext_core::Error::NotFound(subject_id.clone()).into())
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY subject_id"
        ))?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn list_due(
    &self,
    as_of: DateTime<Utc>,
    after: Option<&DueCursor>,
    limit: usize,
  ) -> Result<Vec<Subject>> {
    let as_of_str = encode_dt(as_of);
    let after_at  = after.map(|c| encode_dt(c.last_checkin_at));
    let after_id  = after.map(|c| c.subject_id.as_str().to_owned());
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);
    let disabled  = encode_state(SubjectState::Disabled);

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS}
           FROM subjects
           WHERE state != ?1
             AND deadline_at <= ?2
             AND (?3 IS NULL
                  OR last_checkin_at > ?3
                  OR (last_checkin_at = ?3 AND subject_id > ?4))
           ORDER BY last_checkin_at ASC, subject_id ASC
           LIMIT ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![disabled, as_of_str, after_at, after_id, limit_val],
            RawSubject::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  async fn check_in(&self, subject_id: &SubjectId, at: DateTime<Utc>) -> Result<Subject> {
    let at = stored_precision(at);
    self.update(subject_id, None, move |s| s.check_in(at)).await
  }

  async fn set_state(
    &self,
    subject_id: &SubjectId,
    new_state: SubjectState,
    at: DateTime<Utc>,
  ) -> Result<Subject> {
    let at = stored_precision(at);
    self
      .update(subject_id, None, move |s| s.transition(new_state, at))
      .await
  }

  async fn set_state_if(
    &self,
    subject_id: &SubjectId,
    expected_version: u64,
    new_state: SubjectState,
    at: DateTime<Utc>,
  ) -> Result<Subject> {
    let at = stored_precision(at);
    self
      .update(subject_id, Some(expected_version), move |s| {
        s.transition(new_state, at)
      })
      .await
  }

  async fn mark_escalation_sent(
    &self,
    subject_id: &SubjectId,
    at: DateTime<Utc>,
  ) -> Result<Subject> {
    let at = stored_precision(at);
    self
      .update(subject_id, None, move |s| s.mark_escalation_sent(at))
      .await
  }

  async fn set_contacts(
    &self,
    subject_id: &SubjectId,
    contacts: Vec<Contact>,
  ) -> Result<Subject> {
    self
      .update(subject_id, None, move |s| s.set_contacts(contacts))
      .await
  }

  // ── Attempt log ───────────────────────────────────────────────────────────

  async fn record_attempt(&self, attempt: NotificationAttempt) -> Result<()> {
    let id_str      = encode_uuid(attempt.attempt_id);
    let subject_str = attempt.subject_id.as_str().to_owned();
    let contact_str = attempt.contact.as_str().to_owned();
    let at_str      = encode_dt(attempt.attempted_at);
    let outcome_str = attempt.outcome.discriminant();
    let reason      = attempt.outcome.reason().map(str::to_owned);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_attempts
             (attempt_id, subject_id, contact, attempted_at, outcome, reason)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            subject_str,
            contact_str,
            at_str,
            outcome_str,
            reason
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_attempts(&self, subject_id: &SubjectId) -> Result<Vec<NotificationAttempt>> {
    let id_str = subject_id.as_str().to_owned();

    let raws: Vec<RawAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT attempt_id, subject_id, contact, attempted_at, outcome, reason
           FROM notification_attempts
           WHERE subject_id = ?1
           ORDER BY attempted_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawAttempt {
              attempt_id:   row.get(0)?,
              subject_id:   row.get(1)?,
              contact:      row.get(2)?,
              attempted_at: row.get(3)?,
              outcome:      row.get(4)?,
              reason:       row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttempt::into_attempt).collect()
  }
}
