//! Decoded message model consumed by the matcher.
//!
//! The matcher never touches wire bytes. It reads the fields of an already
//! decoded [`Message`] and flips a handful of lifecycle flags on it, so the
//! flags are atomic and messages are shared as `Arc<Message>` between the
//! matcher, the exchange and whichever layer produced them.

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;

use crate::error::MatchError;

/// Maximum number of bytes a token may carry.
pub const MAX_TOKEN_LEN: usize = 8;

/// Message kinds defined by RFC 7252 §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Confirmable: the receiver must acknowledge it.
    Con,
    /// Non-confirmable: fire and forget.
    Non,
    /// Acknowledgement of a confirmable message.
    Ack,
    /// Reset: the receiver could not process a message.
    Rst,
}

impl MessageType {
    /// Short upper-case label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Con => "CON",
            MessageType::Non => "NON",
            MessageType::Ack => "ACK",
            MessageType::Rst => "RST",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Message code in `class.detail` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Code(u8);

impl Code {
    /// `0.00`, carried by empty ACK/RST messages.
    pub const EMPTY: Code = Code::new(0, 0);
    /// `0.01`
    pub const GET: Code = Code::new(0, 1);
    /// `0.02`
    pub const POST: Code = Code::new(0, 2);
    /// `0.03`
    pub const PUT: Code = Code::new(0, 3);
    /// `0.04`
    pub const DELETE: Code = Code::new(0, 4);
    /// `2.01`
    pub const CREATED: Code = Code::new(2, 1);
    /// `2.02`
    pub const DELETED: Code = Code::new(2, 2);
    /// `2.03`
    pub const VALID: Code = Code::new(2, 3);
    /// `2.04`
    pub const CHANGED: Code = Code::new(2, 4);
    /// `2.05`
    pub const CONTENT: Code = Code::new(2, 5);
    /// `2.31`
    pub const CONTINUE: Code = Code::new(2, 31);
    /// `4.04`
    pub const NOT_FOUND: Code = Code::new(4, 4);
    /// `4.08`
    pub const REQUEST_ENTITY_INCOMPLETE: Code = Code::new(4, 8);
    /// `5.00`
    pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 0);

    /// Build a code from its class (0–7) and detail (0–31).
    #[must_use]
    pub const fn new(class: u8, detail: u8) -> Self { Self(((class & 0x07) << 5) | (detail & 0x1f)) }

    /// The class part of the code.
    #[must_use]
    pub const fn class(self) -> u8 { self.0 >> 5 }

    /// The detail part of the code.
    #[must_use]
    pub const fn detail(self) -> u8 { self.0 & 0x1f }

    /// True for `0.00`.
    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == 0 }

    /// True for method codes (`0.01`–`0.31`).
    #[must_use]
    pub const fn is_request(self) -> bool { self.class() == 0 && self.detail() != 0 }

    /// True for response codes (classes 2–5).
    #[must_use]
    pub const fn is_response(self) -> bool { self.class() >= 2 && self.class() <= 5 }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

/// Opaque request token echoed by responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Token(Bytes);

impl Token {
    /// Wrap `bytes` as a token.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TokenTooLong`] when `bytes` exceeds
    /// [`MAX_TOKEN_LEN`].
    ///
    /// # Examples
    ///
    /// ```
    /// use coap_matcher::message::Token;
    ///
    /// let token = Token::new(vec![0xab]).expect("short token");
    /// assert_eq!(token.as_bytes(), &[0xab]);
    /// assert!(Token::new(vec![0; 9]).is_err());
    /// ```
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, MatchError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_TOKEN_LEN {
            return Err(MatchError::TokenTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// The zero-length token.
    #[must_use]
    pub fn empty() -> Self { Self(Bytes::new()) }

    /// Borrow the raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Number of bytes in the token.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// True for the zero-length token.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("--");
        }
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Block1/Block2 option value (RFC 7959).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockOption {
    num: u32,
    more: bool,
    szx: u8,
}

impl BlockOption {
    /// Create a block option. `szx` is clamped to the valid range `0..=6`.
    #[must_use]
    pub const fn new(num: u32, more: bool, szx: u8) -> Self {
        let szx = if szx > 6 { 6 } else { szx };
        Self { num, more, szx }
    }

    /// Block number.
    #[must_use]
    pub const fn num(self) -> u32 { self.num }

    /// Whether further blocks follow this one.
    #[must_use]
    pub const fn more(self) -> bool { self.more }

    /// Size exponent.
    #[must_use]
    pub const fn szx(self) -> u8 { self.szx }

    /// Block size in bytes, `2^(szx + 4)`.
    #[must_use]
    pub const fn size(self) -> usize { 1 << (self.szx as usize + 4) }
}

/// Atomic lifecycle flags flipped by the matcher and the protocol layers.
#[derive(Debug)]
struct MessageFlags {
    duplicate: AtomicBool,
    acknowledged: AtomicBool,
    rejected: AtomicBool,
    canceled: AtomicBool,
    timed_out: AtomicBool,
    last: AtomicBool,
}

impl Default for MessageFlags {
    fn default() -> Self {
        Self {
            duplicate: AtomicBool::new(false),
            acknowledged: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            last: AtomicBool::new(true),
        }
    }
}

/// A decoded request, response or empty message.
///
/// Fields describing the wire content are fixed at construction through the
/// `with_*` builders. The message id is assigned at most once, either by the
/// builder or by the matcher on the send path.
///
/// # Examples
///
/// ```
/// use coap_matcher::message::{Code, Message, MessageType, Token};
///
/// let request = Message::request(MessageType::Con, Code::GET)
///     .with_id(5)
///     .with_token(Token::new(vec![0xab]).expect("short token"))
///     .with_uri("coap://example/sensors/temp");
/// assert!(request.is_request());
/// assert_eq!(request.id(), Some(5));
/// ```
#[derive(Debug)]
pub struct Message {
    kind: MessageType,
    code: Code,
    id: OnceLock<u16>,
    token: Token,
    source: Option<SocketAddr>,
    destination: Option<SocketAddr>,
    uri: Option<String>,
    block1: Option<BlockOption>,
    block2: Option<BlockOption>,
    observe: Option<u32>,
    payload: Bytes,
    flags: MessageFlags,
}

impl Message {
    fn with_code(kind: MessageType, code: Code) -> Self {
        Self {
            kind,
            code,
            id: OnceLock::new(),
            token: Token::empty(),
            source: None,
            destination: None,
            uri: None,
            block1: None,
            block2: None,
            observe: None,
            payload: Bytes::new(),
            flags: MessageFlags::default(),
        }
    }

    /// Start a request with the given method code.
    #[must_use]
    pub fn request(kind: MessageType, method: Code) -> Self { Self::with_code(kind, method) }

    /// Start a response with the given status code.
    #[must_use]
    pub fn response(kind: MessageType, status: Code) -> Self { Self::with_code(kind, status) }

    /// Start an empty message, typically an ACK or RST.
    #[must_use]
    pub fn empty(kind: MessageType) -> Self { Self::with_code(kind, Code::EMPTY) }

    /// Fix the message id.
    #[must_use]
    pub fn with_id(self, id: u16) -> Self {
        Self {
            id: OnceLock::from(id),
            ..self
        }
    }

    /// Set the token.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// Set the peer this message arrived from.
    #[must_use]
    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the peer this message is addressed to.
    #[must_use]
    pub fn with_destination(mut self, destination: SocketAddr) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Set the request URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Attach a Block1 option.
    #[must_use]
    pub fn with_block1(mut self, block: BlockOption) -> Self {
        self.block1 = Some(block);
        self
    }

    /// Attach a Block2 option.
    #[must_use]
    pub fn with_block2(mut self, block: BlockOption) -> Self {
        self.block2 = Some(block);
        self
    }

    /// Attach an Observe option.
    #[must_use]
    pub fn with_observe(mut self, sequence: u32) -> Self {
        self.observe = Some(sequence);
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Mark whether this is the final response of its exchange.
    #[must_use]
    pub fn with_last(self, last: bool) -> Self {
        self.flags.last.store(last, Ordering::Relaxed);
        self
    }

    #[must_use]
    pub fn kind(&self) -> MessageType { self.kind }

    #[must_use]
    pub fn code(&self) -> Code { self.code }

    /// Message id, if one has been assigned.
    #[must_use]
    pub fn id(&self) -> Option<u16> { self.id.get().copied() }

    /// Return the message id, assigning `next()` first when none is set.
    ///
    /// Concurrent callers observe the same id; `next` runs at most once.
    pub fn id_or_assign(&self, next: impl FnOnce() -> u16) -> u16 { *self.id.get_or_init(next) }

    #[must_use]
    pub fn token(&self) -> &Token { &self.token }

    #[must_use]
    pub fn source(&self) -> Option<SocketAddr> { self.source }

    #[must_use]
    pub fn destination(&self) -> Option<SocketAddr> { self.destination }

    #[must_use]
    pub fn uri(&self) -> Option<&str> { self.uri.as_deref() }

    #[must_use]
    pub fn block1(&self) -> Option<BlockOption> { self.block1 }

    #[must_use]
    pub fn block2(&self) -> Option<BlockOption> { self.block2 }

    #[must_use]
    pub fn observe(&self) -> Option<u32> { self.observe }

    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// True when the code is a request method.
    #[must_use]
    pub fn is_request(&self) -> bool { self.code.is_request() }

    /// True when the code is a response status.
    #[must_use]
    pub fn is_response(&self) -> bool { self.code.is_response() }

    /// True for `0.00` messages.
    #[must_use]
    pub fn is_empty_message(&self) -> bool { self.code.is_empty() }

    /// True when the message carries Block1 or Block2.
    #[must_use]
    pub fn is_blockwise(&self) -> bool { self.block1.is_some() || self.block2.is_some() }

    /// True for responses carrying an Observe option.
    #[must_use]
    pub fn is_notification(&self) -> bool { self.is_response() && self.observe.is_some() }

    #[must_use]
    pub fn is_duplicate(&self) -> bool { self.flags.duplicate.load(Ordering::Acquire) }

    pub fn set_duplicate(&self, duplicate: bool) {
        self.flags.duplicate.store(duplicate, Ordering::Release);
    }

    #[must_use]
    pub fn is_acknowledged(&self) -> bool { self.flags.acknowledged.load(Ordering::Acquire) }

    pub fn set_acknowledged(&self, acknowledged: bool) {
        self.flags.acknowledged.store(acknowledged, Ordering::Release);
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool { self.flags.rejected.load(Ordering::Acquire) }

    pub fn set_rejected(&self, rejected: bool) {
        self.flags.rejected.store(rejected, Ordering::Release);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool { self.flags.canceled.load(Ordering::Acquire) }

    pub fn set_canceled(&self, canceled: bool) {
        self.flags.canceled.store(canceled, Ordering::Release);
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool { self.flags.timed_out.load(Ordering::Acquire) }

    pub fn set_timed_out(&self, timed_out: bool) {
        self.flags.timed_out.store(timed_out, Ordering::Release);
    }

    /// Whether this is the final response of its exchange.
    #[must_use]
    pub fn is_last(&self) -> bool { self.flags.last.load(Ordering::Acquire) }

    pub fn set_last(&self, last: bool) { self.flags.last.store(last, Ordering::Release); }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} MID=", self.kind, self.code)?;
        match self.id() {
            Some(id) => write!(f, "{id}")?,
            None => f.write_str("none")?,
        }
        write!(f, " Token={}", self.token)
    }
}
