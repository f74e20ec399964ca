//! Inbound path: resolve messages to exchanges and flag retransmissions.

use std::{net::SocketAddr, sync::Arc};

use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};

use super::Matcher;
use crate::{
    error::{MatchError, Result},
    exchange::{Exchange, Origin},
    key::{KeyId, KeyToken, KeyUri},
    message::{Message, MessageType},
    metrics::{self, Inbound},
};

fn inbound_id(message: &Message) -> Result<u16> {
    message.id().ok_or(MatchError::MissingId {
        kind: message.kind(),
    })
}

fn remote_origin(message: &Message) -> Result<(u16, SocketAddr)> {
    let id = inbound_id(message)?;
    let source = message.source().ok_or(MatchError::MissingSource {
        kind: message.kind(),
        id,
    })?;
    Ok((id, source))
}

impl Matcher {
    /// Resolve an inbound request to its exchange.
    ///
    /// A request outside a blockwise transfer opens a new remote exchange
    /// unless the deduplicator has seen its id from the same peer, in which
    /// case the request is flagged duplicate and the earlier exchange is
    /// returned. A block request continues the ongoing transfer for its
    /// resource and peer when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingId`] or [`MatchError::MissingSource`] for
    /// requests that cannot be keyed, and [`MatchError::MissingUri`] for
    /// block requests without a URI.
    pub fn receive_request(&self, request: &Arc<Message>) -> Result<Arc<Exchange>> {
        let (id, source) = remote_origin(request)?;
        let key = KeyId::remote(id, source);

        if !request.is_blockwise() {
            return Ok(self.register_remote(request, key, |_| {}));
        }

        let uri_key = KeyUri::new(request.uri().ok_or(MatchError::MissingUri)?, source);
        let ongoing = match self.tables.ongoing.entry(uri_key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                // The shard stays locked until the new exchange is indexed.
                return Ok(self.register_remote(request, key, |exchange| {
                    entry.insert(Arc::clone(exchange));
                }));
            }
        };

        if self.deduplicator.find_or_register(key, &ongoing).is_some() {
            debug!("duplicate block request {request}");
            request.set_duplicate(true);
            metrics::inc_duplicates(Inbound::Request);
        } else {
            // The next block arrived, so the previous block response can no
            // longer be retransmitted.
            if let Some(response) = ongoing.current_response() {
                if response.kind() != MessageType::Ack && response.observe().is_none() {
                    if let Some(id) = response.id() {
                        self.tables.by_id.remove(&KeyId::local(id));
                    }
                }
            }
            metrics::inc_matched(Inbound::Request);
        }
        Ok(ongoing)
    }

    /// Open a remote exchange for `request` unless its id was seen before.
    ///
    /// `index` runs only for a fresh exchange, before tracking starts.
    fn register_remote(
        &self,
        request: &Arc<Message>,
        key: KeyId,
        index: impl FnOnce(&Arc<Exchange>),
    ) -> Arc<Exchange> {
        let exchange = Arc::new(Exchange::new(Arc::clone(request), Origin::Remote));
        if let Some(previous) = self.deduplicator.find_or_register(key, &exchange) {
            debug!("duplicate request {request}");
            request.set_duplicate(true);
            metrics::inc_duplicates(Inbound::Request);
            return previous;
        }
        index(&exchange);
        self.track(&exchange);
        self.purge_if_complete(&exchange);
        metrics::inc_matched(Inbound::Request);
        exchange
    }

    /// Resolve an inbound response to the local exchange that awaits it.
    ///
    /// Returns `None` for responses that match no exchange; an unsolicited
    /// piggy-backed ACK is dropped silently. A separate response that matches
    /// no live exchange but was seen before resolves to the exchange it
    /// matched then, flagged duplicate, so the lost ACK can be resent.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingId`] for responses without an id and
    /// [`MatchError::MissingSource`] for separate responses without a source.
    pub fn receive_response(&self, response: &Arc<Message>) -> Result<Option<Arc<Exchange>>> {
        let key = match response.kind() {
            // ACKs echo an id this endpoint generated.
            MessageType::Ack => KeyId::local(inbound_id(response)?),
            MessageType::Con | MessageType::Non | MessageType::Rst => {
                let (id, source) = remote_origin(response)?;
                KeyId::remote(id, source)
            }
        };

        let Some(exchange) = self.find_by_token(&KeyToken::from(response.token())) else {
            return Ok(self.receive_unmatched_response(response, &key));
        };

        if self.deduplicator.find_or_register(key, &exchange).is_some() {
            debug!("duplicate response {response}");
            response.set_duplicate(true);
            metrics::inc_duplicates(Inbound::Response);
            return Ok(Some(exchange));
        }

        let request_id = exchange.current_request().and_then(|request| request.id());
        if let Some(request_id) = request_id {
            self.tables.by_id.remove(&KeyId::local(request_id));
        }
        if response.kind() == MessageType::Ack && request_id != response.id() {
            warn!(
                "possible MID reuse before lifetime end: token {} expected MID {:?} but received \
                 {response}",
                response.token(),
                request_id
            );
        }
        metrics::inc_matched(Inbound::Response);
        Ok(Some(exchange))
    }

    fn receive_unmatched_response(&self, response: &Message, key: &KeyId) -> Option<Arc<Exchange>> {
        if response.kind() == MessageType::Ack {
            info!(
                "ignoring unmatchable piggy-backed response from {:?}: {response}",
                response.source()
            );
        } else if let Some(previous) = self.deduplicator.find(key) {
            debug!("duplicate separate response {response} for a finished exchange");
            response.set_duplicate(true);
            metrics::inc_duplicates(Inbound::Response);
            return Some(previous);
        } else {
            debug!("ignoring unmatched response {response}");
        }
        metrics::inc_unmatched(Inbound::Response);
        None
    }

    /// Resolve an inbound empty ACK or RST to the exchange whose confirmable
    /// message it answers, consuming the id entry.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingId`] for messages without an id.
    pub fn receive_empty_message(&self, message: &Message) -> Result<Option<Arc<Exchange>>> {
        let key = KeyId::local(inbound_id(message)?);
        if let Some((_, exchange)) = self.tables.by_id.remove(&key) {
            metrics::inc_matched(Inbound::Empty);
            return Ok(Some(exchange));
        }
        debug!("ignoring unmatched empty message {message}");
        metrics::inc_unmatched(Inbound::Empty);
        Ok(None)
    }
}
