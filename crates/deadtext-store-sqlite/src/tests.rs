//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use deadtext_core::{
  ErrorKind, StoreError as _,
  attempt::{AttemptOutcome, NotificationAttempt},
  state::SubjectState,
  store::{CheckinStore, DueSubjects},
  subject::{Contact, NewSubject, SubjectId},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t(secs: i64) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(secs)
}

fn id(s: &str) -> SubjectId { SubjectId::from(s) }

async fn register(s: &SqliteStore, name: &str, timeout: u64, at: i64) {
  s.register(NewSubject::new(name, timeout, ["c1", "c2"]), t(at))
    .await
    .unwrap();
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_get() {
  let s = store().await;
  let created = s
    .register(NewSubject::new("u1", 60, ["c1", "c2"]), t(0))
    .await
    .unwrap();
  assert_eq!(created.state, SubjectState::Active);

  let fetched = s.get(&id("u1")).await.unwrap();
  assert_eq!(fetched, created);
  assert_eq!(fetched.contacts, vec![Contact::from("c1"), Contact::from("c2")]);
  assert_eq!(fetched.last_checkin_at, t(0));
  assert_eq!(fetched.escalation_sent_at, None);
}

#[tokio::test]
async fn returned_subjects_match_what_was_persisted() {
  let s = store().await;
  let at = t(0) + TimeDelta::nanoseconds(123_456_789);

  let created = s
    .register(NewSubject::new("u1", 60, ["c1"]), at)
    .await
    .unwrap();
  assert_eq!(created, s.get(&id("u1")).await.unwrap());
  assert_eq!(created.last_checkin_at, t(0) + TimeDelta::microseconds(123_456));

  let checked = s
    .check_in(&id("u1"), at + TimeDelta::nanoseconds(999))
    .await
    .unwrap();
  assert_eq!(checked, s.get(&id("u1")).await.unwrap());

  let later = t(90) + TimeDelta::nanoseconds(1);
  s.set_state(&id("u1"), SubjectState::Grace, later).await.unwrap();
  s.set_state(&id("u1"), SubjectState::Escalated, later).await.unwrap();
  let stamped = s.mark_escalation_sent(&id("u1"), later).await.unwrap();
  assert_eq!(stamped, s.get(&id("u1")).await.unwrap());
  assert_eq!(stamped.escalation_sent_at, Some(t(90)));
}

#[tokio::test]
async fn register_twice_fails_with_already_exists() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  let err = s
    .register(NewSubject::new("u1", 120, ["c9"]), t(5))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::AlreadyExists);

  // The original record is untouched.
  assert_eq!(s.get(&id("u1")).await.unwrap().timeout_secs, 60);
}

#[tokio::test]
async fn register_rejects_invalid_input() {
  let s = store().await;
  let err = s
    .register(NewSubject::new("u1", 0, ["c1"]), t(0))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidInput);
  assert_eq!(s.get(&id("u1")).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn get_missing_is_not_found() {
  let s = store().await;
  let err = s.get(&id("ghost")).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn list_subjects_is_ordered_by_id() {
  let s = store().await;
  register(&s, "b", 60, 0).await;
  register(&s, "a", 60, 0).await;
  register(&s, "c", 60, 0).await;

  let all = s.list_subjects().await.unwrap();
  let ids: Vec<_> = all.iter().map(|s| s.subject_id.as_str()).collect();
  assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn deregister_is_idempotent() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  s.record_attempt(NotificationAttempt::new(
    id("u1"),
    "c1".into(),
    t(1),
    AttemptOutcome::Delivered,
  ))
  .await
  .unwrap();

  s.deregister(&id("u1")).await.unwrap();
  s.deregister(&id("u1")).await.unwrap();
  s.deregister(&id("never-existed")).await.unwrap();

  assert_eq!(s.get(&id("u1")).await.unwrap_err().kind(), ErrorKind::NotFound);
  assert!(s.list_attempts(&id("u1")).await.unwrap().is_empty());
}

// ─── Check-ins ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_in_moves_timestamp_forward() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  let updated = s.check_in(&id("u1"), t(30)).await.unwrap();
  assert_eq!(updated.last_checkin_at, t(30));
  assert_eq!(s.get(&id("u1")).await.unwrap().last_checkin_at, t(30));
}

#[tokio::test]
async fn stale_check_in_never_regresses() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  s.check_in(&id("u1"), t(30)).await.unwrap();

  let err = s.check_in(&id("u1"), t(10)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::StaleCheckin);

  // Retrying with the same time is fine and changes nothing observable.
  s.check_in(&id("u1"), t(30)).await.unwrap();
  assert_eq!(s.get(&id("u1")).await.unwrap().last_checkin_at, t(30));
}

#[tokio::test]
async fn check_in_unknown_subject_is_not_found() {
  let s = store().await;
  let err = s.check_in(&id("ghost"), t(1)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn check_in_after_escalation_returns_to_active() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  s.set_state(&id("u1"), SubjectState::Grace, t(60)).await.unwrap();
  s.set_state(&id("u1"), SubjectState::Escalated, t(70)).await.unwrap();
  s.mark_escalation_sent(&id("u1"), t(70)).await.unwrap();

  let after = s.check_in(&id("u1"), t(71)).await.unwrap();
  assert_eq!(after.state, SubjectState::Active);
  assert_eq!(after.escalation_sent_at, None);
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_transition_is_rejected_and_not_persisted() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  let before = s.get(&id("u1")).await.unwrap();

  let err = s
    .set_state(&id("u1"), SubjectState::Escalated, t(5))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
  assert_eq!(s.get(&id("u1")).await.unwrap(), before);
}

#[tokio::test]
async fn escalation_without_contacts_is_rejected() {
  let s = store().await;
  s.register(NewSubject::new("lonely", 60, Vec::<Contact>::new()), t(0))
    .await
    .unwrap();
  s.set_state(&id("lonely"), SubjectState::Grace, t(60))
    .await
    .unwrap();

  let err = s
    .set_state(&id("lonely"), SubjectState::Escalated, t(70))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
  assert_eq!(s.get(&id("lonely")).await.unwrap().state, SubjectState::Grace);
}

#[tokio::test]
async fn set_state_if_detects_concurrent_check_in() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  let snapshot = s.get(&id("u1")).await.unwrap();

  // A check-in lands between the read and the scheduler's write.
  s.check_in(&id("u1"), t(59)).await.unwrap();

  let err = s
    .set_state_if(&id("u1"), snapshot.version, SubjectState::Grace, t(60))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let current = s.get(&id("u1")).await.unwrap();
  assert_eq!(current.state, SubjectState::Active);
  assert_eq!(current.last_checkin_at, t(59));
}

#[tokio::test]
async fn disable_and_enable() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  let disabled = s.disable(&id("u1"), t(10)).await.unwrap();
  assert_eq!(disabled.state, SubjectState::Disabled);

  let err = s.disable(&id("u1"), t(11)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);

  let enabled = s.enable(&id("u1"), t(500)).await.unwrap();
  assert_eq!(enabled.state, SubjectState::Active);
  assert_eq!(enabled.last_checkin_at, t(500));

  let err = s.enable(&id("u1"), t(501)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn acknowledge_requires_registered_contact() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  s.set_state(&id("u1"), SubjectState::Grace, t(60)).await.unwrap();
  s.set_state(&id("u1"), SubjectState::Escalated, t(70)).await.unwrap();

  let err = s
    .acknowledge(&id("u1"), &Contact::from("stranger"), t(80))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidInput);

  let acked = s
    .acknowledge(&id("u1"), &Contact::from("c2"), t(80))
    .await
    .unwrap();
  assert_eq!(acked.state, SubjectState::Acknowledged);
}

#[tokio::test]
async fn acknowledge_outside_escalation_is_invalid() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;
  let err = s
    .acknowledge(&id("u1"), &Contact::from("c1"), t(1))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn set_contacts_replaces_in_order() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  let updated = s
    .set_contacts(&id("u1"), vec!["z".into(), "a".into()])
    .await
    .unwrap();
  assert_eq!(updated.contacts, vec![Contact::from("z"), Contact::from("a")]);

  let err = s
    .set_contacts(&id("u1"), vec!["a".into(), "a".into()])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

// ─── Due listing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_due_respects_timeout_boundary() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  assert!(s.list_due(t(59), None, 10).await.unwrap().is_empty());
  let due = s.list_due(t(60), None, 10).await.unwrap();
  assert_eq!(due.len(), 1);
  assert_eq!(due[0].subject_id, id("u1"));
}

#[tokio::test]
async fn list_due_orders_by_silence_then_id() {
  let s = store().await;
  register(&s, "late", 10, 20).await;
  register(&s, "b", 10, 0).await;
  register(&s, "a", 10, 0).await;
  register(&s, "fresh", 1000, 0).await;

  let due = s.list_due(t(100), None, 10).await.unwrap();
  let ids: Vec<_> = due.iter().map(|s| s.subject_id.as_str()).collect();
  assert_eq!(ids, ["a", "b", "late"]);
}

#[tokio::test]
async fn list_due_skips_disabled() {
  let s = store().await;
  register(&s, "u1", 10, 0).await;
  register(&s, "u2", 10, 0).await;
  s.disable(&id("u2"), t(1)).await.unwrap();

  let due = s.list_due(t(100), None, 10).await.unwrap();
  assert_eq!(due.len(), 1);
  assert_eq!(due[0].subject_id, id("u1"));
}

#[tokio::test]
async fn due_subjects_pages_and_restarts() {
  let s = store().await;
  for (i, name) in ["e", "d", "c", "b", "a"].iter().enumerate() {
    register(&s, name, 10, i as i64).await;
  }

  let mut pages = DueSubjects::new(&s, t(100), 2);
  let mut sizes = Vec::new();
  let mut seen = Vec::new();
  while let Some(page) = pages.next_page().await.unwrap() {
    sizes.push(page.len());
    seen.extend(page.into_iter().map(|s| s.subject_id));
  }
  assert_eq!(sizes, [2, 2, 1]);
  let seen: Vec<_> = seen.iter().map(SubjectId::as_str).collect();
  assert_eq!(seen, ["e", "d", "c", "b", "a"]);
  assert!(pages.next_page().await.unwrap().is_none());

  let again = DueSubjects::new(&s, t(100), 2).collect_all().await.unwrap();
  assert_eq!(again.len(), 5);
}

// ─── Attempts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn attempts_roundtrip_in_order() {
  let s = store().await;
  register(&s, "u1", 60, 0).await;

  let outcomes = [
    AttemptOutcome::Failed { reason: "unreachable".into() },
    AttemptOutcome::Delivered,
    AttemptOutcome::TimedOut,
  ];
  for (i, outcome) in outcomes.iter().enumerate() {
    s.record_attempt(NotificationAttempt::new(
      id("u1"),
      Contact::from(format!("c{i}")),
      t(70 + i as i64),
      outcome.clone(),
    ))
    .await
    .unwrap();
  }

  let attempts = s.list_attempts(&id("u1")).await.unwrap();
  let got: Vec<_> = attempts.iter().map(|a| a.outcome.clone()).collect();
  assert_eq!(got, outcomes);
  assert_eq!(attempts[0].contact, Contact::from("c0"));
}

#[tokio::test]
async fn state_survives_reopen() {
  let dir = std::env::temp_dir().join(format!(
    "deadtext-store-test-{}",
    uuid::Uuid::new_v4()
  ));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("deadtext.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    register(&s, "u1", 60, 0).await;
    s.set_state(&id("u1"), SubjectState::Grace, t(60)).await.unwrap();
  }

  let reopened = SqliteStore::open(&path).await.unwrap();
  let subject = reopened.get(&id("u1")).await.unwrap();
  assert_eq!(subject.state, SubjectState::Grace);

  drop(reopened);
  let _ = std::fs::remove_dir_all(&dir);
}
