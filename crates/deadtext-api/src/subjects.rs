//! Handlers for `/subjects` endpoints.
//!
//! | Method   | Path                       | Notes                                   |
//! |----------|----------------------------|-----------------------------------------|
//! | `GET`    | `/subjects`                | Ordered by id                           |
//! | `POST`   | `/subjects`                | Body: `{"subject_id","timeout_secs","contacts"}` |
//! | `GET`    | `/subjects/:id`            | 404 if not found                        |
//! | `DELETE` | `/subjects/:id`            | 204, also when already gone             |
//! | `POST`   | `/subjects/:id/checkin`    | Body: `{"at"?}`, defaults to now        |
//! | `PUT`    | `/subjects/:id/contacts`   | Body: `{"contacts":[..]}`               |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use deadtext_core::{
  store::CheckinStore,
  subject::{Contact, NewSubject, Subject, SubjectId},
};
use serde::Deserialize;

use crate::{ApiState, auth::Authenticated, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subjects = state
    .store
    .list_subjects()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`: registers in ACTIVE with the clock started now.
pub async fn create<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state
    .store
    .register(body, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(subject_id = %subject.subject_id, "subject registered");
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state.store.get(&id).await.map_err(ApiError::from_store)?;
  Ok(Json(subject))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /subjects/:id`
pub async fn delete<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
) -> Result<StatusCode, ApiError>
where
  S: CheckinStore + 'static,
{
  state
    .store
    .deregister(&id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(subject_id = %id, "subject deregistered");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Check-in ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CheckInBody {
  pub at: Option<DateTime<Utc>>,
}

/// `POST /subjects/:id/checkin`
///
/// An explicit `at` lets a client replay a check-in it recorded while
/// offline. Timestamps in the future are rejected.
pub async fn check_in<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
  body: Option<Json<CheckInBody>>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let now = Utc::now();
  let at = body.and_then(|Json(b)| b.at).unwrap_or(now);
  if at > now {
    return Err(ApiError::BadRequest(format!(
      "check-in time {at} is in the future"
    )));
  }

  let subject = state
    .store
    .check_in(&id, at)
    .await
    .map_err(ApiError::from_store)?;
  tracing::debug!(subject_id = %id, %at, state = %subject.state, "check-in");
  Ok(Json(subject))
}

// ─── Contacts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ContactsBody {
  pub contacts: Vec<Contact>,
}

/// `PUT /subjects/:id/contacts`
pub async fn set_contacts<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Path(id): Path<SubjectId>,
  Json(body): Json<ContactsBody>,
) -> Result<Json<Subject>, ApiError>
where
  S: CheckinStore + 'static,
{
  let subject = state
    .store
    .set_contacts(&id, body.contacts)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(subject))
}
