//! JSON administration API for deadtext.
//!
//! Exposes an axum [`Router`] backed by any
//! [`deadtext_core::store::CheckinStore`]. Every route requires HTTP Basic
//! auth. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", deadtext_api::api_router(state))
//! ```

pub mod auth;
pub mod due;
pub mod error;
pub mod escalation;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use deadtext_core::store::CheckinStore;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, auth: AuthConfig) -> Self {
    Self { store, auth: Arc::new(auth) }
  }
}

// Derived `Clone` would require `S: Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      auth:  Arc::clone(&self.auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: CheckinStore + 'static,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>).delete(subjects::delete::<S>),
    )
    .route("/subjects/{id}/checkin",  post(subjects::check_in::<S>))
    .route("/subjects/{id}/contacts", put(subjects::set_contacts::<S>))
    // Escalation control
    .route("/subjects/{id}/disable",     post(escalation::disable::<S>))
    .route("/subjects/{id}/enable",      post(escalation::enable::<S>))
    .route("/subjects/{id}/acknowledge", post(escalation::acknowledge::<S>))
    .route("/subjects/{id}/attempts",    get(escalation::attempts::<S>))
    // Due listing
    .route("/due", get(due::handler::<S>))
    .with_state(state)
}
