//! Observe relations (RFC 7641) as seen by the matcher.
//!
//! The observe layer owns the relation and records every non-confirmable
//! notification it sends. The matcher drains that list whenever the pending
//! notifications can no longer be acknowledged, so their ids leave the
//! exchange table.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::message::Message;

/// A standing registration under which a resource notifies one peer.
#[derive(Debug)]
pub struct ObserveRelation {
    peer: SocketAddr,
    uri: String,
    established: AtomicBool,
    canceled: AtomicBool,
    notifications: Mutex<Vec<Arc<Message>>>,
}

impl ObserveRelation {
    /// Create a relation for `uri` observed by `peer`.
    #[must_use]
    pub fn new(peer: SocketAddr, uri: impl Into<String>) -> Self {
        Self {
            peer,
            uri: uri.into(),
            established: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            notifications: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn peer(&self) -> SocketAddr { self.peer }

    #[must_use]
    pub fn uri(&self) -> &str { &self.uri }

    #[must_use]
    pub fn is_established(&self) -> bool { self.established.load(Ordering::Acquire) }

    pub fn set_established(&self, established: bool) {
        self.established.store(established, Ordering::Release);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool { self.canceled.load(Ordering::Acquire) }

    /// Cancel the relation. Pending notifications stay recorded until drained.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.established.store(false, Ordering::Release);
    }

    /// Record a notification that awaits no acknowledgement.
    pub fn add_notification(&self, notification: Arc<Message>) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    /// Remove and return every recorded notification.
    pub fn clear_notifications(&self) -> Vec<Arc<Message>> {
        std::mem::take(&mut *self.notifications.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of notifications currently recorded.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
