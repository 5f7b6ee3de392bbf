//! Error type for `deadtext-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Another cycle still holds the cycle guard.
  #[error("an evaluation cycle is already in progress")]
  CycleInProgress,

  /// The store failed before any subject could be evaluated.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
