//! In-memory transport and application for driving an endpoint.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use coap_matcher::{Exchange, Message, MessageDeliverer, MessageType, Outbox, SendError};

/// One message handed to the transport.
#[derive(Clone, Debug)]
pub enum Sent {
    Request(Arc<Message>),
    Response(Arc<Message>),
    Empty(Arc<Message>),
}

impl Sent {
    /// The message regardless of how it was sent.
    #[must_use]
    pub fn message(&self) -> &Arc<Message> {
        match self {
            Sent::Request(message) | Sent::Response(message) | Sent::Empty(message) => message,
        }
    }

    /// Type of the sent message.
    #[must_use]
    pub fn kind(&self) -> MessageType { self.message().kind() }
}

#[derive(Default)]
struct Log {
    sent: Vec<Sent>,
    requests: Vec<Arc<Exchange>>,
    responses: Vec<(Arc<Exchange>, Arc<Message>)>,
}

/// Records everything an endpoint sends and delivers.
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Log>,
    failing: AtomicBool,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// This recorder as the endpoint's transport.
    #[must_use]
    pub fn outbox(self: &Arc<Self>) -> Arc<dyn Outbox> { self.clone() }

    /// This recorder as the endpoint's application.
    #[must_use]
    pub fn deliverer(self: &Arc<Self>) -> Arc<dyn MessageDeliverer> { self.clone() }

    /// Make every later send fail with an I/O error.
    pub fn fail_sends(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }

    fn lock(&self) -> MutexGuard<'_, Log> { self.log.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Messages sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> { self.lock().sent.clone() }

    /// Sent messages of type `kind`.
    #[must_use]
    pub fn sent_of(&self, kind: MessageType) -> Vec<Arc<Message>> {
        self.lock()
            .sent
            .iter()
            .filter(|sent| sent.kind() == kind)
            .map(|sent| Arc::clone(sent.message()))
            .collect()
    }

    /// Exchanges delivered as requests, oldest first.
    #[must_use]
    pub fn delivered_requests(&self) -> Vec<Arc<Exchange>> { self.lock().requests.clone() }

    /// Responses delivered with their exchanges, oldest first.
    #[must_use]
    pub fn delivered_responses(&self) -> Vec<(Arc<Exchange>, Arc<Message>)> {
        self.lock().responses.clone()
    }

    fn record(&self, sent: Sent) -> Result<(), SendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed").into());
        }
        self.lock().sent.push(sent);
        Ok(())
    }
}

impl Outbox for Recorder {
    fn send_request(&self, _: &Arc<Exchange>, request: Arc<Message>) -> Result<(), SendError> {
        self.record(Sent::Request(request))
    }

    fn send_response(&self, _: &Arc<Exchange>, response: Arc<Message>) -> Result<(), SendError> {
        self.record(Sent::Response(response))
    }

    fn send_empty_message(
        &self,
        _: Option<&Arc<Exchange>>,
        message: Arc<Message>,
    ) -> Result<(), SendError> {
        self.record(Sent::Empty(message))
    }
}

impl MessageDeliverer for Recorder {
    fn deliver_request(&self, exchange: &Arc<Exchange>) {
        self.lock().requests.push(Arc::clone(exchange));
    }

    fn deliver_response(&self, exchange: &Arc<Exchange>, response: Arc<Message>) {
        self.lock().responses.push((Arc::clone(exchange), response));
    }
}
