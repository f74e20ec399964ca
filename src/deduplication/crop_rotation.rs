use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::trace;

use super::{Deduplicator, periodic::PeriodicTask};
use crate::{exchange::Exchange, key::KeyId};

const GENERATIONS: usize = 3;

#[derive(Debug, Default)]
struct Crops {
    maps: [DashMap<KeyId, Arc<Exchange>>; GENERATIONS],
    current: RwLock<usize>,
}

impl Crops {
    fn previous(current: usize) -> usize { (current + GENERATIONS - 1) % GENERATIONS }

    fn rotate(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = (*current + 1) % GENERATIONS;
        // The generation about to become current is the oldest one.
        self.maps[next].clear();
        *current = next;
        trace!(generation = next, "crop rotation advanced");
    }
}

/// Crop-rotation deduplicator.
///
/// Records live in one of three generations. Lookups consult the current and
/// the previous generation; each rotation discards the oldest generation, so
/// a record survives between one and two rotation periods.
#[derive(Debug)]
pub struct CropRotationDeduplicator {
    crops: Arc<Crops>,
    period: Duration,
    task: PeriodicTask,
}

impl CropRotationDeduplicator {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            crops: Arc::new(Crops::default()),
            period,
            task: PeriodicTask::default(),
        }
    }

    /// Advance to the next generation, discarding the oldest records.
    pub fn rotate(&self) { self.crops.rotate(); }

    /// Whether the background rotation task is running.
    #[must_use]
    pub fn is_running(&self) -> bool { self.task.is_running() }
}

impl Deduplicator for CropRotationDeduplicator {
    fn find_or_register(&self, key: KeyId, exchange: &Arc<Exchange>) -> Option<Arc<Exchange>> {
        // Rotation waits for this guard, so neither generation is cleared
        // between the lookup and the insert.
        let current = self.crops.current.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = self.crops.maps[Crops::previous(*current)].get(&key) {
            return Some(Arc::clone(found.value()));
        }
        match self.crops.maps[*current].entry(key) {
            Entry::Occupied(occupied) => Some(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(exchange));
                None
            }
        }
    }

    fn find(&self, key: &KeyId) -> Option<Arc<Exchange>> {
        let current = self.crops.current.read().unwrap_or_else(PoisonError::into_inner);
        [*current, Crops::previous(*current)]
            .into_iter()
            .find_map(|generation| {
                self.crops.maps[generation]
                    .get(key)
                    .map(|entry| Arc::clone(entry.value()))
            })
    }

    fn clear(&self) {
        for map in &self.crops.maps {
            map.clear();
        }
    }

    fn start(&self) {
        let crops = Arc::clone(&self.crops);
        self.task.start("crop-rotation", self.period, move || crops.rotate());
    }

    fn stop(&self) { self.task.stop(); }
}
