//! Handlers that steer a subject's escalation state by hand.
//!
//! | Method | Path                           | Notes                   |
//! |--------|--------------------------------|-------------------------|
//! | `POST` | `/subjects/:id/disable`        | Any state -> DISABLED   |
//! | `POST` | `/subjects/:id/enable`         | DISABLED -> ACTIVE      |
//! | `POST` | `/subjects/:id/acknowledge`    | Body: `{"contact"}`     |
//! | `GET`  | `/subjects/:id/attempts`       | Oldest first            |

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::Utc;
use deadtext_core::{
  attempt::NotificationAttempt,
  store::CheckinStore,
  subject::{Contact, Subject, SubjectId},
};
use serde::Deserialize;

use crate::{ApiState, auth::Authenticated, error::ApiError};

/// `POST /subjects/:id/disable`
pub async fn disable<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state
    .store
    .disable(&id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(subject_id = %id, "subject disabled");
  Ok(Json(subject))
}

/// `POST /subjects/:id/enable`
pub async fn enable<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state
    .store
    .enable(&id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(subject_id = %id, "subject enabled");
  Ok(Json(subject))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeBody {
  pub contact: Contact,
}

/// `POST /subjects/:id/acknowledge`
pub async fn acknowledge<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
  Json(body): Json<AcknowledgeBody>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state
    .store
    .acknowledge(&id, &body.contact, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(subject_id = %id, contact = %body.contact, "escalation acknowledged");
  Ok(Json(subject))
}

/// `GET /subjects/:id/attempts`
pub async fn attempts<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
) -> Result<Json<Vec<NotificationAttempt>>, ApiError>
where
  S: CheckinStore + 'static,
{
  // Distinguish an unknown subject from one that was never escalated.
  state.store.get(&id).await.map_err(ApiError::from_store)?;
  let attempts = state
    .store
    .list_attempts(&id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(attempts))
}
