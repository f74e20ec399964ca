//! Collaborator seams around the matcher and a thin endpoint wiring them.
//!
//! [`Outbox`] is whatever writes messages to the transport and
//! [`MessageDeliverer`] is the application side receiving resolved
//! exchanges. [`Endpoint`] runs every outbound message through its
//! [`Matcher`] before the transport sees it and dispatches decoded inbound
//! messages to the matcher and then to the deliverer.

mod dispatch;

use std::sync::{Arc, Weak};

use log::trace;

use crate::{
    config::MatcherConfig,
    error::{ExchangeError, MatchError, SendError},
    exchange::{Exchange, Origin},
    matcher::Matcher,
    message::{BlockOption, Message, MessageType},
};

/// Sink for outbound messages.
pub trait Outbox: Send + Sync {
    /// Send a request belonging to `exchange`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the message cannot be indexed or written.
    fn send_request(&self, exchange: &Arc<Exchange>, request: Arc<Message>) -> Result<(), SendError>;

    /// Send a response belonging to `exchange`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the message cannot be indexed or written.
    fn send_response(
        &self,
        exchange: &Arc<Exchange>,
        response: Arc<Message>,
    ) -> Result<(), SendError>;

    /// Send an empty ACK or RST, optionally on behalf of `exchange`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the message cannot be written.
    fn send_empty_message(
        &self,
        exchange: Option<&Arc<Exchange>>,
        message: Arc<Message>,
    ) -> Result<(), SendError>;
}

/// Consumer of resolved inbound exchanges.
pub trait MessageDeliverer: Send + Sync {
    /// A new request, or the next block of an ongoing one, arrived.
    fn deliver_request(&self, exchange: &Arc<Exchange>);

    /// A response to a local exchange arrived.
    fn deliver_response(&self, exchange: &Arc<Exchange>, response: Arc<Message>);
}

/// One matcher bound to a transport and an application deliverer.
pub struct Endpoint {
    matcher: Matcher,
    transport: Arc<dyn Outbox>,
    deliverer: Arc<dyn MessageDeliverer>,
    this: Weak<Endpoint>,
}

impl Endpoint {
    /// Create an endpoint writing through `transport` and delivering to
    /// `deliverer`.
    #[must_use]
    pub fn new(
        config: MatcherConfig,
        transport: Arc<dyn Outbox>,
        deliverer: Arc<dyn MessageDeliverer>,
    ) -> Arc<Self> {
        Self::with_matcher(Matcher::new(config), transport, deliverer)
    }

    /// Create an endpoint around an existing matcher.
    #[must_use]
    pub fn with_matcher(
        matcher: Matcher,
        transport: Arc<dyn Outbox>,
        deliverer: Arc<dyn MessageDeliverer>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            matcher,
            transport,
            deliverer,
            this: this.clone(),
        })
    }

    #[must_use]
    pub fn matcher(&self) -> &Matcher { &self.matcher }

    /// Start the matcher's periodic maintenance.
    pub fn start(&self) { self.matcher.start(); }

    /// Stop the matcher's periodic maintenance.
    pub fn stop(&self) { self.matcher.stop(); }

    /// Forget every exchange.
    pub fn clear(&self) { self.matcher.clear(); }

    /// Bind `exchange` to this endpoint unless it already is.
    fn adopt(&self, exchange: &Exchange) -> Result<(), ExchangeError> {
        let outbox: Weak<dyn Outbox> = self.this.clone();
        match exchange.bind(outbox, Arc::downgrade(&self.deliverer)) {
            Ok(()) | Err(ExchangeError::AlreadyBound) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Issue `request` as a new local exchange.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Send`] when the transport rejects the request.
    pub fn send_request(&self, request: Message) -> Result<Arc<Exchange>, ExchangeError> {
        let request = Arc::new(request);
        let exchange = Arc::new(Exchange::new(Arc::clone(&request), Origin::Local));
        self.adopt(&exchange)?;
        Outbox::send_request(self, &exchange, request)?;
        Ok(exchange)
    }
}

impl Outbox for Endpoint {
    fn send_request(&self, exchange: &Arc<Exchange>, request: Arc<Message>) -> Result<(), SendError> {
        self.matcher.send_request(exchange, &request);
        trace!("sending request {request}");
        self.transport.send_request(exchange, request)
    }

    fn send_response(
        &self,
        exchange: &Arc<Exchange>,
        response: Arc<Message>,
    ) -> Result<(), SendError> {
        if response.kind() == MessageType::Ack {
            // A piggy-backed response reuses the id of the request it acknowledges.
            let request = exchange.current_request().ok_or(MatchError::MissingRequest)?;
            let request_id = request.id().ok_or(MatchError::MissingId {
                kind: request.kind(),
            })?;
            response.id_or_assign(|| request_id);
            request.set_acknowledged(true);
        }
        if response.block2().is_some_and(BlockOption::more) {
            response.set_last(false);
        }
        let relation = exchange
            .relation()
            .filter(|relation| relation.is_established() && !relation.is_canceled());
        if let (Some(relation), Some(_)) = (&relation, response.observe()) {
            response.set_last(false);
            if response.kind() == MessageType::Non {
                relation.add_notification(Arc::clone(&response));
            }
        }
        self.matcher.send_response(exchange, &response)?;
        trace!("sending response {response}");
        self.transport.send_response(exchange, response)
    }

    fn send_empty_message(
        &self,
        exchange: Option<&Arc<Exchange>>,
        message: Arc<Message>,
    ) -> Result<(), SendError> {
        self.matcher.send_empty_message(exchange, &message);
        trace!("sending empty message {message}");
        self.transport.send_empty_message(exchange, message)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}
