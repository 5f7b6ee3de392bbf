//! Core types and trait definitions for the deadtext check-in service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store backend, the escalation engine and the API all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attempt;
pub mod error;
pub mod notify;
pub mod state;
pub mod store;
pub mod subject;

pub use error::{Error, ErrorKind, Result, StoreError};
