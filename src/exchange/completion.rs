//! Single-shot completion signal with late-subscriber delivery.

use std::sync::PoisonError;

use super::Exchange;
use crate::sync::{AtomicBool, Mutex, Ordering};

/// Callback run once when an exchange completes.
pub type CompletionListener = Box<dyn FnOnce(&Exchange) + Send + 'static>;

/// Fires its listeners exactly once.
///
/// Listeners subscribed after the signal fired run immediately on the
/// subscribing thread, so no listener is lost to the race between
/// subscription and completion.
pub(super) struct CompletionSignal {
    fired: AtomicBool,
    listeners: Mutex<Vec<CompletionListener>>,
}

impl CompletionSignal {
    pub(super) fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn is_fired(&self) -> bool { self.fired.load(Ordering::Acquire) }

    /// Fire the signal, returning `true` only for the call that fired it.
    pub(super) fn fire(&self, exchange: &Exchange) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let listeners = {
            let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for listener in listeners {
            listener(exchange);
        }
        true
    }

    pub(super) fn subscribe(&self, exchange: &Exchange, listener: CompletionListener) {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.fired.load(Ordering::Acquire) {
            guard.push(listener);
            return;
        }
        drop(guard);
        listener(exchange);
    }

    pub(super) fn pending(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
