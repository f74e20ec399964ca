//! State of one logical request/response interaction.
//!
//! An [`Exchange`] holds the originating request, the responses answering it
//! and the per-exchange state protocol layers attach along the way. It owns a
//! single-shot completion signal: the first call to
//! [`Exchange::set_complete`] runs every registered listener, which is how
//! the matcher learns to purge the exchange from its tables.

mod attributes;
mod completion;

use std::{
    fmt,
    sync::{
        Arc,
        OnceLock,
        PoisonError,
        RwLock,
        Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

pub use attributes::ExchangeAttributes;
use completion::CompletionSignal;
pub use completion::CompletionListener;

use crate::{
    blockwise::BlockwiseStatus,
    endpoint::{MessageDeliverer, Outbox},
    error::ExchangeError,
    message::{Message, MessageType},
    observe::ObserveRelation,
};

/// Which side of the interaction created the exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// This endpoint issued the request.
    Local,
    /// This endpoint is answering a request from a peer.
    Remote,
}

impl Origin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

struct Binding {
    outbox: Weak<dyn Outbox>,
    deliverer: Weak<dyn MessageDeliverer>,
}

fn read<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// One request and the stream of responses answering it.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use coap_matcher::{
///     exchange::{Exchange, Origin},
///     message::{Code, Message, MessageType},
/// };
///
/// let request = Arc::new(Message::request(MessageType::Con, Code::GET).with_id(1));
/// let exchange = Exchange::new(request, Origin::Local);
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// exchange.on_complete(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(exchange.set_complete());
/// assert!(!exchange.set_complete());
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct Exchange {
    origin: Origin,
    timestamp: Instant,
    request: RwLock<Option<Arc<Message>>>,
    current_request: RwLock<Option<Arc<Message>>>,
    response: RwLock<Option<Arc<Message>>>,
    current_response: RwLock<Option<Arc<Message>>>,
    request_block_status: RwLock<Option<BlockwiseStatus>>,
    response_block_status: RwLock<Option<BlockwiseStatus>>,
    relation: RwLock<Option<Arc<ObserveRelation>>>,
    timed_out: AtomicBool,
    tracked: AtomicBool,
    completion: CompletionSignal,
    attributes: ExchangeAttributes,
    binding: OnceLock<Binding>,
}

impl Exchange {
    /// Create an exchange for `request`, which becomes both the original and
    /// the current request.
    #[must_use]
    pub fn new(request: Arc<Message>, origin: Origin) -> Self {
        Self {
            origin,
            timestamp: Instant::now(),
            request: RwLock::new(Some(Arc::clone(&request))),
            current_request: RwLock::new(Some(request)),
            response: RwLock::new(None),
            current_response: RwLock::new(None),
            request_block_status: RwLock::new(None),
            response_block_status: RwLock::new(None),
            relation: RwLock::new(None),
            timed_out: AtomicBool::new(false),
            tracked: AtomicBool::new(false),
            completion: CompletionSignal::new(),
            attributes: ExchangeAttributes::default(),
            binding: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> Origin { self.origin }

    /// Creation time, used for round-trip timing and lifetime expiry.
    #[must_use]
    pub fn timestamp(&self) -> Instant { self.timestamp }

    /// The request that opened the exchange.
    #[must_use]
    pub fn request(&self) -> Option<Arc<Message>> { read(&self.request) }

    pub fn set_request(&self, request: Option<Arc<Message>>) { write(&self.request, request); }

    /// The request most recently sent or received, e.g. the latest block.
    #[must_use]
    pub fn current_request(&self) -> Option<Arc<Message>> { read(&self.current_request) }

    pub fn set_current_request(&self, request: Option<Arc<Message>>) {
        write(&self.current_request, request);
    }

    /// The complete response, once assembled.
    #[must_use]
    pub fn response(&self) -> Option<Arc<Message>> { read(&self.response) }

    pub fn set_response(&self, response: Option<Arc<Message>>) { write(&self.response, response); }

    /// The response most recently sent or received.
    #[must_use]
    pub fn current_response(&self) -> Option<Arc<Message>> { read(&self.current_response) }

    pub fn set_current_response(&self, response: Option<Arc<Message>>) {
        write(&self.current_response, response);
    }

    /// Progress of a blockwise request body; `None` when no transfer is open.
    #[must_use]
    pub fn request_block_status(&self) -> Option<BlockwiseStatus> { read(&self.request_block_status) }

    pub fn set_request_block_status(&self, status: Option<BlockwiseStatus>) {
        write(&self.request_block_status, status);
    }

    /// Progress of a blockwise response body; `None` when no transfer is open.
    #[must_use]
    pub fn response_block_status(&self) -> Option<BlockwiseStatus> {
        read(&self.response_block_status)
    }

    pub fn set_response_block_status(&self, status: Option<BlockwiseStatus>) {
        write(&self.response_block_status, status);
    }

    #[must_use]
    pub fn relation(&self) -> Option<Arc<ObserveRelation>> { read(&self.relation) }

    pub fn set_relation(&self, relation: Option<Arc<ObserveRelation>>) {
        write(&self.relation, relation);
    }

    /// Per-exchange attribute store.
    #[must_use]
    pub fn attributes(&self) -> &ExchangeAttributes { &self.attributes }

    #[must_use]
    pub fn is_complete(&self) -> bool { self.completion.is_fired() }

    /// Mark the exchange complete and run its completion listeners.
    ///
    /// Only the first call has any effect; it returns `true`. Later calls
    /// return `false` and run nothing.
    pub fn set_complete(&self) -> bool { self.completion.fire(self) }

    #[must_use]
    pub fn is_timed_out(&self) -> bool { self.timed_out.load(Ordering::Acquire) }

    /// Flag the exchange as timed out, which also completes it.
    pub fn set_timed_out(&self) -> bool {
        self.timed_out.store(true, Ordering::Release);
        if let Some(request) = self.current_request() {
            request.set_timed_out(true);
        }
        self.set_complete()
    }

    /// Register `listener` to run once when the exchange completes.
    ///
    /// A listener registered after completion runs immediately.
    pub fn on_complete(&self, listener: impl FnOnce(&Exchange) + Send + 'static) {
        self.completion.subscribe(self, Box::new(listener));
    }

    /// Number of listeners still waiting for completion.
    #[must_use]
    pub fn pending_listeners(&self) -> usize { self.completion.pending() }

    /// Claim the exchange for index tracking, returning `true` only for the
    /// first claim.
    pub(crate) fn claim_tracking(&self) -> bool { !self.tracked.swap(true, Ordering::AcqRel) }

    /// Attach the endpoint this exchange sends through and delivers to.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::AlreadyBound`] when the exchange was bound
    /// before.
    pub fn bind(
        &self,
        outbox: Weak<dyn Outbox>,
        deliverer: Weak<dyn MessageDeliverer>,
    ) -> Result<(), ExchangeError> {
        self.binding
            .set(Binding { outbox, deliverer })
            .map_err(|_| ExchangeError::AlreadyBound)
    }

    /// The bound outbox, if the exchange is bound and the endpoint is alive.
    #[must_use]
    pub fn outbox(&self) -> Option<Arc<dyn Outbox>> {
        self.binding.get().and_then(|binding| binding.outbox.upgrade())
    }

    /// The bound deliverer, if the exchange is bound and the endpoint is alive.
    #[must_use]
    pub fn deliverer(&self) -> Option<Arc<dyn MessageDeliverer>> {
        self.binding.get().and_then(|binding| binding.deliverer.upgrade())
    }

    fn require_outbox(&self) -> Result<Arc<dyn Outbox>, ExchangeError> {
        let binding = self.binding.get().ok_or(ExchangeError::Unbound)?;
        binding.outbox.upgrade().ok_or(ExchangeError::EndpointGone)
    }

    fn remote_request(&self) -> Result<Arc<Message>, ExchangeError> {
        if self.origin != Origin::Remote {
            return Err(ExchangeError::NotRemote);
        }
        self.current_request().ok_or(ExchangeError::MissingRequest)
    }

    /// Acknowledge the current request with an empty ACK.
    ///
    /// Does nothing unless the request is confirmable and not yet
    /// acknowledged.
    ///
    /// # Errors
    ///
    /// Fails when the exchange is not remote, has no request, is unbound, or
    /// the outbox rejects the ACK.
    pub fn send_accept(self: &Arc<Self>) -> Result<(), ExchangeError> {
        let request = self.remote_request()?;
        if request.kind() != MessageType::Con || request.is_acknowledged() {
            return Ok(());
        }
        let outbox = self.require_outbox()?;
        request.set_acknowledged(true);
        let ack = reply_to(&request, MessageType::Ack);
        outbox.send_empty_message(Some(self), Arc::new(ack))?;
        Ok(())
    }

    /// Reject the current request with an RST.
    ///
    /// # Errors
    ///
    /// Fails when the exchange is not remote, has no request, is unbound, or
    /// the outbox rejects the RST.
    pub fn send_reject(self: &Arc<Self>) -> Result<(), ExchangeError> {
        let request = self.remote_request()?;
        let outbox = self.require_outbox()?;
        request.set_rejected(true);
        let rst = reply_to(&request, MessageType::Rst);
        outbox.send_empty_message(Some(self), Arc::new(rst))?;
        Ok(())
    }

    /// Answer the current request with `response`.
    ///
    /// The response is addressed to the request's source, inherits the
    /// request's token unless it carries one, is recorded as both the
    /// response and the current response, and is handed to the outbox.
    ///
    /// # Errors
    ///
    /// Fails when the exchange is not remote, has no request, is unbound, or
    /// the outbox rejects the response.
    pub fn send_response(self: &Arc<Self>, response: Message) -> Result<(), ExchangeError> {
        let request = self.remote_request()?;
        let outbox = self.require_outbox()?;
        let response = match request.source() {
            Some(source) => response.with_destination(source),
            None => response,
        };
        let response = if response.token().is_empty() {
            response.with_token(request.token().clone())
        } else {
            response
        };
        let response = Arc::new(response);
        self.set_response(Some(Arc::clone(&response)));
        self.set_current_response(Some(Arc::clone(&response)));
        outbox.send_response(self, response)?;
        Ok(())
    }
}

/// Build an empty `kind` message answering `request`.
fn reply_to(request: &Message, kind: MessageType) -> Message {
    let reply = Message::empty(kind);
    let reply = match request.id() {
        Some(id) => reply.with_id(id),
        None => reply,
    };
    match request.source() {
        Some(source) => reply.with_destination(source),
        None => reply,
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("origin", &self.origin)
            .field("current_request", &self.current_request())
            .field("current_response", &self.current_response())
            .field("complete", &self.is_complete())
            .field("timed_out", &self.is_timed_out())
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
