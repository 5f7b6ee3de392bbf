//! Deadline scheduler and escalation engine.
//!
//! [`Engine::run_cycle`] is the whole public surface: an external timer
//! calls it with the current time, and it walks every due subject through
//! the state machine, notifying contacts when a subject freshly escalates.
//! The engine owns no timer thread, so tests drive it with synthetic clocks.

mod engine;
mod plan;

pub mod config;
pub mod error;

pub use config::EngineConfig;
pub use engine::{CycleReport, Engine, SkippedSubject, Transition};
pub use error::{Error, Result};
pub use plan::{Step, plan};
