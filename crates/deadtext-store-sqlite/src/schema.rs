//! SQL schema for the deadtext SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = FULL;
PRAGMA foreign_keys = ON;

-- One row per tracked subject. Rows are rewritten whole inside a
-- transaction; `version` is bumped on every write.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id         TEXT PRIMARY KEY,
    created_at         TEXT NOT NULL,
    last_checkin_at    TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    deadline_at        TEXT NOT NULL,   -- last_checkin_at + timeout_secs
    timeout_secs       INTEGER NOT NULL CHECK (timeout_secs > 0),
    contacts           TEXT NOT NULL DEFAULT '[]',   -- JSON array, in order
    state              TEXT NOT NULL,
    escalation_sent_at TEXT,
    version            INTEGER NOT NULL
);

-- Append-only. Rows go away only with their subject.
CREATE TABLE IF NOT EXISTS notification_attempts (
    attempt_id   TEXT PRIMARY KEY,
    subject_id   TEXT NOT NULL
                 REFERENCES subjects(subject_id) ON DELETE CASCADE,
    contact      TEXT NOT NULL,
    attempted_at TEXT NOT NULL,
    outcome      TEXT NOT NULL,   -- 'delivered' | 'failed' | 'timed_out'
    reason       TEXT
);

CREATE INDEX IF NOT EXISTS subjects_due_idx
    ON subjects(state, deadline_at);
CREATE INDEX IF NOT EXISTS subjects_checkin_idx
    ON subjects(last_checkin_at, subject_id);
CREATE INDEX IF NOT EXISTS attempts_subject_idx
    ON notification_attempts(subject_id, attempted_at);

PRAGMA user_version = 1;
";
