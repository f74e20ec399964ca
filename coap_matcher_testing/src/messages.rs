//! Builders for the messages integration tests exchange most often.

use std::net::SocketAddr;

use bytes::Bytes;
use coap_matcher::{Code, Message, MessageType, Token};

/// Address of the peer most tests talk to.
#[must_use]
pub fn peer() -> SocketAddr { SocketAddr::from(([192, 0, 2, 1], 5683)) }

/// A second peer, for tests that need two sources.
#[must_use]
pub fn other_peer() -> SocketAddr { SocketAddr::from(([192, 0, 2, 2], 5683)) }

/// Token wrapping `bytes`.
///
/// # Panics
///
/// Panics when `bytes` is longer than a token may be.
#[must_use]
pub fn token(bytes: &[u8]) -> Token {
    Token::new(Bytes::copy_from_slice(bytes)).expect("test tokens are at most 8 bytes")
}

/// Inbound confirmable GET from [`peer`].
#[must_use]
pub fn con_get(id: u16, token_bytes: &[u8]) -> Message {
    Message::request(MessageType::Con, Code::GET)
        .with_id(id)
        .with_token(token(token_bytes))
        .with_source(peer())
        .with_uri("/sensors/temp")
}

/// Inbound piggy-backed 2.05 response from [`peer`].
#[must_use]
pub fn ack_response(id: u16, token_bytes: &[u8]) -> Message {
    Message::response(MessageType::Ack, Code::CONTENT)
        .with_id(id)
        .with_token(token(token_bytes))
        .with_source(peer())
}

/// Inbound separate confirmable 2.05 response from [`peer`].
#[must_use]
pub fn con_response(id: u16, token_bytes: &[u8]) -> Message {
    Message::response(MessageType::Con, Code::CONTENT)
        .with_id(id)
        .with_token(token(token_bytes))
        .with_source(peer())
}

/// Inbound empty `kind` message from [`peer`].
#[must_use]
pub fn empty(kind: MessageType, id: u16) -> Message {
    Message::empty(kind).with_id(id).with_source(peer())
}
