//! Outbound path: assign ids and index what a reply must find.

use std::sync::Arc;

use log::{debug, trace};

use super::Matcher;
use crate::{
    error::{MatchError, Result},
    exchange::Exchange,
    key::{KeyId, KeyToken, KeyUri},
    message::{Message, MessageType},
};

impl Matcher {
    /// Index an outbound request of a local exchange.
    ///
    /// Assigns a message id if the request has none, then registers the
    /// exchange under the request's local id (for ACK/RST matching) and its
    /// token (for response matching).
    pub fn send_request(&self, exchange: &Arc<Exchange>, request: &Message) {
        let id = request.id_or_assign(|| self.next_id());
        self.track(exchange);
        self.tables.by_id.insert(KeyId::local(id), Arc::clone(exchange));
        self.tables
            .by_token
            .insert(KeyToken::from(request.token()), Arc::clone(exchange));
        self.purge_if_complete(exchange);
        trace!("tracking outbound request {request}");
    }

    /// Index an outbound response of a remote exchange.
    ///
    /// Only confirmable responses and active observe relations keep the
    /// exchange alive; anything else completes it once the last fragment has
    /// been sent.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingRequest`], [`MatchError::MissingUri`] or
    /// [`MatchError::MissingDestination`] when a Block2 response cannot be
    /// keyed to its transfer. No table is modified in that case.
    pub fn send_response(&self, exchange: &Arc<Exchange>, response: &Message) -> Result<()> {
        let id = response.id_or_assign(|| self.next_id());
        let ongoing_key = match response.block2() {
            Some(block2) => Some((ongoing_key(exchange, response, id)?, block2)),
            None => None,
        };
        self.track(exchange);

        let confirmable = matches!(response.kind(), MessageType::Con | MessageType::Ack);
        if let Some(relation) = exchange.relation().filter(|_| confirmable) {
            // A confirmable notification supersedes earlier unacknowledged ones.
            self.tables.remove_notifications_of(&relation);
        }

        if let Some((key, block2)) = ongoing_key {
            if block2.more() && response.observe().is_none() {
                if self.tables.ongoing.insert(key.clone(), Arc::clone(exchange)).is_none() {
                    debug!("ongoing blockwise transfer registered under {key}");
                }
            } else {
                // Finished transfers and notifications are never ongoing.
                self.tables.ongoing.remove(&key);
            }
        }

        match response.kind() {
            MessageType::Con | MessageType::Non => {
                self.tables.by_id.insert(KeyId::local(id), Arc::clone(exchange));
            }
            MessageType::Ack | MessageType::Rst => {}
        }
        self.purge_if_complete(exchange);

        if response.kind() != MessageType::Con && response.is_last() {
            exchange.set_complete();
        }
        Ok(())
    }

    /// Handle an outbound empty message.
    ///
    /// A reset always ends the exchange it belongs to.
    pub fn send_empty_message(&self, exchange: Option<&Arc<Exchange>>, message: &Message) {
        match message.kind() {
            MessageType::Rst => {
                if let Some(exchange) = exchange {
                    exchange.set_complete();
                }
            }
            MessageType::Con | MessageType::Non | MessageType::Ack => {}
        }
    }
}

fn ongoing_key(exchange: &Exchange, response: &Message, id: u16) -> Result<KeyUri> {
    let request = exchange.current_request().ok_or(MatchError::MissingRequest)?;
    let uri = request.uri().ok_or(MatchError::MissingUri)?;
    let destination = response.destination().ok_or(MatchError::MissingDestination {
        kind: response.kind(),
        id,
    })?;
    Ok(KeyUri::new(uri, destination))
}
