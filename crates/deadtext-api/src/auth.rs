//! HTTP Basic auth for the API.
//!
//! One operator account, configured at startup with an argon2 PHC hash.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use deadtext_core::store::CheckinStore;

use crate::{ApiState, error::ApiError};

/// The operator credentials this server accepts.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// argon2 PHC string, as printed by `deadtext --hash-password`.
  pub password_hash: String,
}

/// Handler argument proving the request carried valid credentials.
pub struct Authenticated;

/// `username:password` pair decoded from an `Authorization: Basic` header.
struct BasicCredentials {
  username: String,
  password: String,
}

impl BasicCredentials {
  fn from_headers(headers: &HeaderMap) -> Option<Self> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
      return None;
    }
    let decoded = String::from_utf8(B64.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Self {
      username: username.to_owned(),
      password: password.to_owned(),
    })
  }
}

impl AuthConfig {
  fn accepts(&self, creds: &BasicCredentials) -> bool {
    if creds.username != self.username {
      return false;
    }
    let Ok(hash) = PasswordHash::new(&self.password_hash) else {
      tracing::error!("configured auth_password_hash is not a valid PHC string");
      return false;
    };
    Argon2::default()
      .verify_password(creds.password.as_bytes(), &hash)
      .is_ok()
  }
}

/// Check the `Authorization` header against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  match BasicCredentials::from_headers(headers) {
    Some(creds) if config.accepts(&creds) => Ok(()),
    Some(creds) => {
      tracing::debug!(username = %creds.username, "rejected credentials");
      Err(ApiError::Unauthorized)
    }
    None => Err(ApiError::Unauthorized),
  }
}

impl<S> FromRequestParts<ApiState<S>> for Authenticated
where
  S: CheckinStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(|()| Authenticated)
  }
}
