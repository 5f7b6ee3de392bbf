//! Handler for `GET /due`.
//!
//! Returns one page of the due sequence. Pass the `subject_id` and
//! `last_checkin_at` of the final element back as `after_id` and
//! `after_checkin` to fetch the next page.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use deadtext_core::{
  store::{CheckinStore, DueCursor},
  subject::{Subject, SubjectId},
};
use serde::Deserialize;

use crate::{ApiState, auth::Authenticated, error::ApiError};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct DueParams {
  pub as_of:         Option<DateTime<Utc>>,
  pub limit:         Option<usize>,
  pub after_checkin: Option<DateTime<Utc>>,
  pub after_id:      Option<SubjectId>,
}

impl DueParams {
  fn cursor(&self) -> Result<Option<DueCursor>, ApiError> {
    match (&self.after_checkin, &self.after_id) {
      (Some(at), Some(id)) => Ok(Some(DueCursor {
        last_checkin_at: *at,
        subject_id:      id.clone(),
      })),
      (None, None) => Ok(None),
      _ => Err(ApiError::BadRequest(
        "after_checkin and after_id must be given together".to_string(),
      )),
    }
  }
}

/// `GET /due[?as_of=<rfc3339>&limit=<n>&after_checkin=..&after_id=..]`
pub async fn handler<S>(
  _auth: Authenticated,
  State(state): State<ApiState<S>>,
  Query(params): Query<DueParams>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: CheckinStore + 'static,
{
  let as_of = params.as_of.unwrap_or_else(Utc::now);
  let limit = match params.limit {
    Some(0) => return Err(ApiError::BadRequest("limit must be positive".to_string())),
    Some(n) => n.min(MAX_LIMIT),
    None => DEFAULT_LIMIT,
  };
  let cursor = params.cursor()?;

  let page = state
    .store
    .list_due(as_of, cursor.as_ref(), limit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}
