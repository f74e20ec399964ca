use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use super::{Deduplicator, periodic::PeriodicTask};
use crate::{exchange::Exchange, key::KeyId};

#[derive(Debug, Default)]
struct SweepState {
    exchanges: DashMap<KeyId, Arc<Exchange>>,
}

impl SweepState {
    fn sweep_at(&self, lifetime: Duration, now: Instant) -> usize {
        let before = self.exchanges.len();
        self.exchanges
            .retain(|_, exchange| now.saturating_duration_since(exchange.timestamp()) < lifetime);
        let removed = before.saturating_sub(self.exchanges.len());
        if removed > 0 {
            debug!(removed, remaining = self.exchanges.len(), "swept expired exchanges");
        }
        removed
    }
}

/// Mark-and-sweep deduplicator.
///
/// Every registered exchange is kept until it is older than the exchange
/// lifetime. A background pass removes expired records every sweep
/// interval once [`Deduplicator::start`] has been called inside a Tokio
/// runtime; [`SweepDeduplicator::sweep_at`] runs a pass by hand.
#[derive(Debug)]
pub struct SweepDeduplicator {
    state: Arc<SweepState>,
    lifetime: Duration,
    interval: Duration,
    task: PeriodicTask,
}

impl SweepDeduplicator {
    #[must_use]
    pub fn new(lifetime: Duration, interval: Duration) -> Self {
        Self {
            state: Arc::new(SweepState::default()),
            lifetime,
            interval,
            task: PeriodicTask::default(),
        }
    }

    /// Remove records older than the exchange lifetime as of `now`.
    ///
    /// Returns the number of records removed.
    pub fn sweep_at(&self, now: Instant) -> usize { self.state.sweep_at(self.lifetime, now) }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize { self.state.exchanges.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.state.exchanges.is_empty() }

    /// Whether the background sweep task is running.
    #[must_use]
    pub fn is_running(&self) -> bool { self.task.is_running() }
}

impl Deduplicator for SweepDeduplicator {
    fn find_or_register(&self, key: KeyId, exchange: &Arc<Exchange>) -> Option<Arc<Exchange>> {
        match self.state.exchanges.entry(key) {
            Entry::Occupied(occupied) => Some(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(exchange));
                None
            }
        }
    }

    fn find(&self, key: &KeyId) -> Option<Arc<Exchange>> {
        self.state.exchanges.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn clear(&self) { self.state.exchanges.clear(); }

    fn start(&self) {
        let state = Arc::clone(&self.state);
        let lifetime = self.lifetime;
        self.task.start("mark-and-sweep", self.interval, move || {
            state.sweep_at(lifetime, Instant::now());
        });
    }

    fn stop(&self) { self.task.stop(); }
}
