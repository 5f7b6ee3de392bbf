//! Wiring for the `deadtext` binary: configuration, notifier transports and
//! the timer that drives the escalation engine.

pub mod config;
pub mod driver;
pub mod notifier;

pub use config::ServerConfig;
pub use notifier::AppNotifier;
