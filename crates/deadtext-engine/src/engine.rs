//! [`Engine`]: one evaluation pass over every due subject.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use deadtext_core::{
  ErrorKind, StoreError,
  attempt::{AttemptOutcome, NotificationAttempt},
  notify::{EscalationMessage, Notifier},
  state::SubjectState,
  store::{CheckinStore, DueSubjects},
  subject::{Subject, SubjectId},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
  EngineConfig, Error, Result,
  plan::{Step, plan},
};

// ─── Report ──────────────────────────────────────────────────────────────────

/// A state change applied during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub subject_id: SubjectId,
  pub from:       SubjectState,
  pub to:         SubjectState,
}

/// A subject whose evaluation stopped early; it is retried next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSubject {
  pub subject_id: SubjectId,
  pub kind:       ErrorKind,
  pub reason:     String,
}

/// What a single [`Engine::run_cycle`] did.
#[derive(Debug, Clone)]
pub struct CycleReport {
  pub now:             DateTime<Utc>,
  /// Due subjects looked at.
  pub evaluated:       usize,
  pub transitions:     Vec<Transition>,
  /// Subjects whose escalation batch was dispatched and stamped.
  pub escalated:       Vec<SubjectId>,
  pub attempts:        usize,
  pub failed_attempts: usize,
  pub skipped:         Vec<SkippedSubject>,
}

impl CycleReport {
  fn new(now: DateTime<Utc>) -> Self {
    Self {
      now,
      evaluated: 0,
      transitions: Vec::new(),
      escalated: Vec::new(),
      attempts: 0,
      failed_attempts: 0,
      skipped: Vec::new(),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Drives due subjects through the state machine and dispatches escalations.
///
/// Cycles never overlap: a call made while another is running fails fast
/// with [`Error::CycleInProgress`]. Check-ins racing a cycle are handled by
/// compare-and-swap writes in the store, so the engine holds no per-subject
/// locks.
pub struct Engine<S, N> {
  store:       Arc<S>,
  notifier:    Arc<N>,
  config:      EngineConfig,
  cycle_guard: Mutex<()>,
}

impl<S, N> Engine<S, N>
where
  S: CheckinStore,
  N: Notifier,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, config: EngineConfig) -> Self {
    Self {
      store,
      notifier,
      config,
      cycle_guard: Mutex::new(()),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Evaluate every due subject as of `now`.
  ///
  /// Only a failure to list due subjects before any was evaluated is
  /// returned as an error. Per-subject failures are logged, collected in
  /// [`CycleReport::skipped`] and left for the next cycle.
  pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
    let Ok(_guard) = self.cycle_guard.try_lock() else {
      warn!(%now, "previous cycle still running, skipping");
      return Err(Error::CycleInProgress);
    };

    let mut report = CycleReport::new(now);
    let mut due = DueSubjects::new(&*self.store, now, self.config.page_size);

    loop {
      let page = match due.next_page().await {
        Ok(Some(page)) => page,
        Ok(None) => break,
        Err(e) if report.evaluated == 0 => {
          return Err(Error::Store(Box::new(e)));
        }
        Err(e) => {
          warn!(error = %e, "listing due subjects failed mid-cycle");
          break;
        }
      };

      for subject in page {
        report.evaluated += 1;
        self.evaluate(subject, now, &mut report).await;
      }
    }

    if report.evaluated > 0 {
      info!(
        evaluated = report.evaluated,
        transitions = report.transitions.len(),
        escalated = report.escalated.len(),
        failed_attempts = report.failed_attempts,
        skipped = report.skipped.len(),
        "cycle complete"
      );
    } else {
      debug!(%now, "cycle complete, nothing due");
    }

    Ok(report)
  }

  async fn evaluate(
    &self,
    subject: Subject,
    now: DateTime<Utc>,
    report: &mut CycleReport,
  ) {
    let mut current = subject;

    for step in plan(&current, now, &self.config) {
      match step {
        Step::Transition(to) => {
          let from = current.state;
          let result = self
            .store
            .set_state_if(&current.subject_id, current.version, to, now)
            .await;

          match result {
            Ok(updated) => {
              info!(subject_id = %current.subject_id, %from, %to, "state transition");
              report.transitions.push(Transition {
                subject_id: current.subject_id.clone(),
                from,
                to,
              });
              current = updated;
            }
            Err(e) => {
              skip(report, &current.subject_id, &e);
              return;
            }
          }
        }
        Step::Dispatch => {
          if let Err(e) = self.dispatch(&current, now, report).await {
            skip(report, &current.subject_id, &e);
            return;
          }
        }
      }
    }
  }

  /// Notify every contact in priority order, record each attempt, then stamp
  /// `escalation_sent_at`. A failed or slow contact never stops the rest.
  ///
  /// The stamp lands on an acknowledged subject too. If a check-in returned
  /// the subject to active first, there is nothing left to stamp.
  async fn dispatch(
    &self,
    subject: &Subject,
    now: DateTime<Utc>,
    report: &mut CycleReport,
  ) -> std::result::Result<(), S::Error> {
    let id = &subject.subject_id;
    if subject.contacts.is_empty() {
      return Err(deadtext_core::Error::NoContacts(id.clone()).into());
    }

    let message = EscalationMessage::render(&self.config.message_template, subject);
    info!(subject_id = %id, contacts = subject.contacts.len(), "escalating");

    for contact in &subject.contacts {
      let call = self.notifier.notify(contact, &message);
      let outcome = match tokio::time::timeout(self.config.notify_timeout, call).await {
        Ok(Ok(())) => AttemptOutcome::Delivered,
        Ok(Err(e)) => {
          warn!(subject_id = %id, %contact, error = %e, "notification failed");
          AttemptOutcome::Failed { reason: e.to_string() }
        }
        Err(_) => {
          warn!(
            subject_id = %id,
            %contact,
            timeout = ?self.config.notify_timeout,
            "notification timed out"
          );
          AttemptOutcome::TimedOut
        }
      };

      report.attempts += 1;
      if !outcome.is_delivered() {
        report.failed_attempts += 1;
      }

      let attempt =
        NotificationAttempt::new(id.clone(), contact.clone(), now, outcome);
      if let Err(e) = self.store.record_attempt(attempt).await {
        warn!(subject_id = %id, %contact, error = %e, "could not record attempt");
      }
    }

    match self.store.mark_escalation_sent(id, now).await {
      Ok(stamped) => {
        if stamped.state == SubjectState::Acknowledged {
          debug!(subject_id = %id, "acknowledged while the batch was going out");
        }
        report.escalated.push(id.clone());
        Ok(())
      }
      // A check-in or disable beat the stamp; the escalation is already over.
      Err(e) if e.kind() == ErrorKind::Conflict => {
        debug!(subject_id = %id, error = %e, "escalation withdrawn during dispatch");
        Ok(())
      }
      Err(e) => Err(e),
    }
  }
}

fn skip<E: StoreError>(report: &mut CycleReport, subject_id: &SubjectId, e: &E) {
  let kind = e.kind();
  match kind {
    ErrorKind::Conflict | ErrorKind::NotFound => {
      debug!(%subject_id, error = %e, "subject changed during cycle");
    }
    _ => warn!(%subject_id, error = %e, "subject evaluation skipped"),
  }
  report.skipped.push(SkippedSubject {
    subject_id: subject_id.clone(),
    kind,
    reason: e.to_string(),
  });
}
