//! The three exchange indexes and the cleanup run on completion.

use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use log::{debug, trace};

use crate::{
    exchange::{Exchange, Origin},
    key::{KeyId, KeyToken, KeyUri},
    message::MessageType,
    metrics,
    observe::ObserveRelation,
};

/// Remove `key` from `map` only while it still points at `exchange`.
///
/// A key may have been re-bound to a newer exchange, e.g. after message id
/// wrap-around; that binding must survive the older exchange's cleanup.
fn remove_if_bound<K>(map: &DashMap<K, Arc<Exchange>>, key: &K, exchange: &Exchange) -> bool
where
    K: Eq + Hash,
{
    map.remove_if(key, |_, bound| std::ptr::eq(Arc::as_ptr(bound), exchange))
        .is_some()
}

#[derive(Debug, Default)]
pub(super) struct ExchangeTables {
    pub(super) by_id: DashMap<KeyId, Arc<Exchange>>,
    pub(super) by_token: DashMap<KeyToken, Arc<Exchange>>,
    pub(super) ongoing: DashMap<KeyUri, Arc<Exchange>>,
}

impl ExchangeTables {
    pub(super) fn clear(&self) {
        self.by_id.clear();
        self.by_token.clear();
        self.ongoing.clear();
    }

    /// Drop the id entries of every pending notification of `relation`.
    pub(super) fn remove_notifications_of(&self, relation: &ObserveRelation) {
        for notification in relation.clear_notifications() {
            if let Some(id) = notification.id() {
                trace!("forgetting notification {id} of {}", relation.uri());
                self.by_id.remove(&KeyId::local(id));
            }
        }
    }

    /// Completion listener body: purge the exchange and count it.
    pub(super) fn on_completed(&self, exchange: &Exchange) {
        self.purge(exchange);
        metrics::inc_completed(exchange.origin());
    }

    /// Remove every index entry still pointing at `exchange`.
    pub(super) fn purge(&self, exchange: &Exchange) {
        match exchange.origin() {
            Origin::Local => self.purge_local(exchange),
            Origin::Remote => self.purge_remote(exchange),
        }
    }

    fn purge_local(&self, exchange: &Exchange) {
        let Some(request) = exchange.current_request() else {
            return;
        };
        if let Some(id) = request.id() {
            remove_if_bound(&self.by_id, &KeyId::local(id), exchange);
        }
        remove_if_bound(&self.by_token, &KeyToken::from(request.token()), exchange);
        debug!("local exchange completed: {request}");
    }

    fn purge_remote(&self, exchange: &Exchange) {
        let response = exchange.current_response();
        if let Some(response) = response.as_ref().filter(|r| r.kind() != MessageType::Ack) {
            // ACK and RST responses are never indexed by id.
            if let Some(id) = response.id() {
                remove_if_bound(&self.by_id, &KeyId::local(id), exchange);
            }
        }

        let request = exchange.current_request();
        if let Some(request) = &request {
            let blockwise =
                request.is_blockwise() || response.as_ref().is_some_and(|r| r.is_blockwise());
            if let (true, Some(uri), Some(source)) = (blockwise, request.uri(), request.source()) {
                remove_if_bound(&self.ongoing, &KeyUri::new(uri, source), exchange);
            }
        }

        if let Some(relation) = exchange.relation() {
            self.remove_notifications_of(&relation);
        }
        if let Some(request) = request {
            debug!("remote exchange completed: {request}");
        }
    }
}
