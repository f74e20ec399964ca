//! Inbound dispatch: matcher first, then the reliability reactions and the
//! deliverer.

use std::sync::Arc;

use log::{debug, trace};

use super::{Endpoint, Outbox};
use crate::{
    error::{ExchangeError, SendError},
    exchange::{Exchange, Origin},
    message::{BlockOption, Message, MessageType},
};

/// Empty `kind` message answering `message` at its source.
fn answer(message: &Message, kind: MessageType) -> Arc<Message> {
    let mut reply = Message::empty(kind);
    if let Some(id) = message.id() {
        reply = reply.with_id(id);
    }
    if let Some(source) = message.source() {
        reply = reply.with_destination(source);
    }
    Arc::new(reply)
}

impl Endpoint {
    /// Handle one decoded inbound message.
    ///
    /// Messages with neither a request, response nor empty code are dropped.
    /// The caller may keep a shared handle to inspect the duplicate flag.
    ///
    /// # Errors
    ///
    /// Fails when the matcher cannot key the message or a reply cannot be
    /// written.
    pub fn receive(&self, message: impl Into<Arc<Message>>) -> Result<(), ExchangeError> {
        let message = message.into();
        trace!("received {message}");
        if message.is_request() {
            self.receive_request(&message)
        } else if message.is_response() {
            self.receive_response(&message)
        } else if message.is_empty_message() {
            self.receive_empty_message(&message)
        } else {
            debug!("dropping message with unsupported code: {message}");
            Ok(())
        }
    }

    fn receive_request(&self, request: &Arc<Message>) -> Result<(), ExchangeError> {
        let exchange = self.matcher.receive_request(request).map_err(SendError::from)?;
        if request.is_duplicate() {
            return self.answer_duplicate_request(&exchange, request);
        }
        self.adopt(&exchange)?;
        exchange.set_current_request(Some(Arc::clone(request)));
        self.deliverer.deliver_request(&exchange);
        Ok(())
    }

    /// Repeat whatever the exchange already told the peer.
    fn answer_duplicate_request(
        &self,
        exchange: &Arc<Exchange>,
        request: &Message,
    ) -> Result<(), ExchangeError> {
        let original = exchange.current_request();
        if let Some(response) = exchange.current_response() {
            debug!("retransmitting {response} for duplicate {request}");
            self.transport.send_response(exchange, response)?;
        } else if original.as_ref().is_some_and(|r| r.is_acknowledged()) {
            debug!("re-acknowledging duplicate {request}");
            self.transport
                .send_empty_message(Some(exchange), answer(request, MessageType::Ack))?;
        } else if original.as_ref().is_some_and(|r| r.is_rejected()) {
            debug!("re-rejecting duplicate {request}");
            self.transport
                .send_empty_message(Some(exchange), answer(request, MessageType::Rst))?;
        } else {
            debug!("duplicate {request} arrived while the original is still being processed");
        }
        Ok(())
    }

    fn receive_response(&self, response: &Arc<Message>) -> Result<(), ExchangeError> {
        let Some(exchange) = self.matcher.receive_response(response).map_err(SendError::from)?
        else {
            if response.kind() == MessageType::Con {
                Outbox::send_empty_message(self, None, answer(response, MessageType::Rst))?;
            }
            return Ok(());
        };

        if response.kind() == MessageType::Con {
            Outbox::send_empty_message(self, Some(&exchange), answer(response, MessageType::Ack))?;
        }
        if response.is_duplicate() {
            return Ok(());
        }
        if response.kind() == MessageType::Ack {
            if let Some(request) = exchange.current_request() {
                request.set_acknowledged(true);
            }
        }

        let more_blocks = response.block2().is_some_and(BlockOption::more);
        exchange.set_current_response(Some(Arc::clone(response)));
        if !more_blocks {
            exchange.set_response(Some(Arc::clone(response)));
        }
        if response.observe().is_none() && !more_blocks {
            exchange.set_complete();
        }
        self.deliverer.deliver_response(&exchange, Arc::clone(response));
        Ok(())
    }

    fn receive_empty_message(&self, message: &Message) -> Result<(), ExchangeError> {
        let Some(exchange) = self.matcher.receive_empty_message(message).map_err(SendError::from)?
        else {
            return Ok(());
        };
        let confirmed = match exchange.origin() {
            Origin::Local => exchange.current_request(),
            Origin::Remote => exchange.current_response(),
        };
        match message.kind() {
            MessageType::Ack => {
                if let Some(confirmed) = &confirmed {
                    confirmed.set_acknowledged(true);
                }
                // A confirmed final response ends a remote exchange.
                let finished = exchange.origin() == Origin::Remote
                    && exchange.relation().is_none()
                    && confirmed.is_some_and(|response| response.is_last());
                if finished {
                    exchange.set_complete();
                }
            }
            MessageType::Rst => {
                if let Some(confirmed) = &confirmed {
                    confirmed.set_rejected(true);
                }
                if let Some(relation) = exchange.relation() {
                    relation.cancel();
                }
                exchange.set_complete();
            }
            MessageType::Con | MessageType::Non => {
                debug!("ignoring empty {message}");
            }
        }
        Ok(())
    }
}
