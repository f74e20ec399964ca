//! Background task driving periodic deduplicator maintenance.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Owns at most one running maintenance task.
#[derive(Debug, Default)]
pub(super) struct PeriodicTask {
    shutdown: Mutex<Option<CancellationToken>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period` on the current Tokio runtime.
    ///
    /// Does nothing if the task is already running. Without a runtime the
    /// task is not started and maintenance must be driven by hand.
    pub(super) fn start<F>(&self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let mut shutdown = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
        if shutdown.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(task = name, "no Tokio runtime; periodic maintenance disabled");
            return;
        };
        let token = CancellationToken::new();
        let cancelled = token.clone();
        runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => tick(),
                }
            }
            debug!(task = name, "periodic maintenance stopped");
        });
        debug!(task = name, ?period, "periodic maintenance started");
        *shutdown = Some(token);
    }

    /// Cancel the running task, if any.
    pub(super) fn stop(&self) {
        if let Some(token) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    pub(super) fn is_running(&self) -> bool {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) { self.stop(); }
}
