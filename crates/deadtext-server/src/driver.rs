//! The clock that drives [`Engine::run_cycle`].

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use deadtext_core::{notify::Notifier, store::CheckinStore};
use deadtext_engine::{Engine, Error};
use tokio::{
  sync::watch,
  time::{MissedTickBehavior, interval},
};

/// Run a cycle immediately, then every `every`, until `shutdown` flips to
/// `true`. A cycle in flight when shutdown is signalled runs to completion.
///
/// Ticks missed while a slow cycle runs are skipped rather than replayed.
pub async fn run<S, N>(
  engine: Arc<Engine<S, N>>,
  every: Duration,
  mut shutdown: watch::Receiver<bool>,
) where
  S: CheckinStore,
  N: Notifier,
{
  let mut ticker = interval(every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  tracing::info!(interval = ?every, "scheduler started");
  loop {
    tokio::select! {
      _ = ticker.tick() => {}
      _ = shutdown.changed() => break,
    }
    if *shutdown.borrow() {
      break;
    }

    match engine.run_cycle(Utc::now()).await {
      Ok(_) | Err(Error::CycleInProgress) => {}
      Err(e) => tracing::error!(error = %e, "cycle failed"),
    }
  }
  tracing::info!("scheduler stopped");
}
