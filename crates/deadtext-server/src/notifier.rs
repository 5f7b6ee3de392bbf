//! Notifier transports wired up by the server binary.

use deadtext_core::{
  Error, Result,
  notify::{EscalationMessage, Notifier},
  subject::{Contact, SubjectId},
};
use serde::Serialize;

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Writes each escalation as a `tracing` event. Never fails.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  async fn notify(&self, contact: &Contact, message: &EscalationMessage) -> Result<()> {
    tracing::warn!(
      subject_id = %message.subject_id,
      %contact,
      text = %message.text,
      "escalation"
    );
    Ok(())
  }
}

// ─── Webhook ──────────────────────────────────────────────────────────────────

/// JSON body posted for each contact.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
  pub contact:    &'a Contact,
  pub subject_id: &'a SubjectId,
  pub text:       &'a str,
}

/// POSTs a [`WebhookPayload`] to a fixed URL. Any non-2xx answer counts as a
/// failed delivery.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: reqwest::Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    Self { client: reqwest::Client::new(), url: url.into() }
  }
}

impl Notifier for WebhookNotifier {
  async fn notify(&self, contact: &Contact, message: &EscalationMessage) -> Result<()> {
    let failure = |reason: String| Error::NotifierFailure {
      contact: contact.clone(),
      reason,
    };

    let payload = WebhookPayload {
      contact,
      subject_id: &message.subject_id,
      text: &message.text,
    };

    self
      .client
      .post(&self.url)
      .json(&payload)
      .send()
      .await
      .map_err(|e| failure(e.to_string()))?
      .error_for_status()
      .map_err(|e| failure(e.to_string()))?;

    tracing::debug!(subject_id = %message.subject_id, %contact, "webhook delivered");
    Ok(())
  }
}

// ─── Selection ────────────────────────────────────────────────────────────────

/// The notifier chosen by configuration.
#[derive(Debug, Clone)]
pub enum AppNotifier {
  Log(LogNotifier),
  Webhook(WebhookNotifier),
}

impl AppNotifier {
  pub fn from_webhook_url(url: Option<&str>) -> Self {
    match url {
      Some(url) => Self::Webhook(WebhookNotifier::new(url)),
      None => Self::Log(LogNotifier),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Log(_) => "log",
      Self::Webhook(_) => "webhook",
    }
  }
}

impl Notifier for AppNotifier {
  async fn notify(&self, contact: &Contact, message: &EscalationMessage) -> Result<()> {
    match self {
      Self::Log(n) => n.notify(contact, message).await,
      Self::Webhook(n) => n.notify(contact, message).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
  use chrono::{TimeZone as _, Utc};
  use deadtext_core::{ErrorKind, StoreError as _, subject::NewSubject};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  type Received = Arc<Mutex<Vec<Value>>>;

  /// Serve a one-route webhook sink on an ephemeral port.
  async fn sink(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
      .route(
        "/hook",
        post(move |State(rx): State<Received>, Json(body): Json<Value>| async move {
          rx.lock().unwrap().push(body);
          status
        }),
      )
      .with_state(received.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/hook"), received)
  }

  fn message() -> EscalationMessage {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let subject = NewSubject::new("alice", 60, ["bob"]).into_subject(at).unwrap();
    EscalationMessage::render("{subject} went quiet", &subject)
  }

  #[tokio::test]
  async fn webhook_posts_payload() {
    let (url, received) = sink(StatusCode::OK).await;
    let notifier = WebhookNotifier::new(url);

    notifier.notify(&Contact::from("bob"), &message()).await.unwrap();

    let bodies = received.lock().unwrap();
    assert_eq!(
      *bodies,
      [json!({ "contact": "bob", "subject_id": "alice", "text": "alice went quiet" })]
    );
  }

  #[tokio::test]
  async fn webhook_error_status_is_a_failure() {
    let (url, _) = sink(StatusCode::INTERNAL_SERVER_ERROR).await;
    let notifier = WebhookNotifier::new(url);

    let err = notifier
      .notify(&Contact::from("bob"), &message())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotifierFailure);
  }

  #[tokio::test]
  async fn unreachable_webhook_is_a_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let notifier = WebhookNotifier::new(format!("http://{addr}/hook"));
    let err = notifier
      .notify(&Contact::from("bob"), &message())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotifierFailure { .. }));
  }

  #[tokio::test]
  async fn log_notifier_always_succeeds() {
    let notifier = AppNotifier::from_webhook_url(None);
    assert!(matches!(notifier, AppNotifier::Log(_)));
    notifier.notify(&Contact::from("bob"), &message()).await.unwrap();
  }
}
