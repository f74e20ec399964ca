//! Canonical error and result types for the crate.
//!
//! Duplicate and unmatched traffic is not an error: the matcher reports it
//! through `Option` returns and the message's duplicate flag. The enums here
//! cover contract violations only, which fail the single call that hit them.

use thiserror::Error;

use crate::message::{MAX_TOKEN_LEN, MessageType};

/// Contract violations detected while deriving lookup keys from a message.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    /// A token longer than the protocol allows was constructed.
    #[error("token of {0} bytes exceeds the {max}-byte limit", max = MAX_TOKEN_LEN)]
    TokenTooLong(usize),
    /// An inbound message reached the matcher without a message id.
    #[error("inbound {kind} message has no message id")]
    MissingId {
        /// Type of the offending message.
        kind: MessageType,
    },
    /// An inbound message reached the matcher without a source endpoint.
    #[error("inbound {kind} message {id} has no source endpoint")]
    MissingSource {
        /// Type of the offending message.
        kind: MessageType,
        /// Message id of the offending message.
        id: u16,
    },
    /// An outbound blockwise response has no destination endpoint.
    #[error("outbound {kind} response {id} has no destination endpoint")]
    MissingDestination {
        /// Type of the offending message.
        kind: MessageType,
        /// Message id of the offending message.
        id: u16,
    },
    /// A blockwise request has no URI to key the ongoing transfer by.
    #[error("blockwise request has no URI")]
    MissingUri,
    /// The exchange has no current request to derive keys from.
    #[error("exchange has no current request")]
    MissingRequest,
}

/// Errors raised by [`Exchange`](crate::exchange::Exchange) back-reference handling.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The exchange was bound to an endpoint twice.
    #[error("exchange is already bound to an endpoint")]
    AlreadyBound,
    /// The exchange was never bound to an endpoint.
    #[error("exchange is not bound to an endpoint")]
    Unbound,
    /// The endpoint the exchange was bound to has been dropped.
    #[error("endpoint bound to the exchange has been dropped")]
    EndpointGone,
    /// The exchange has no request to answer.
    #[error("exchange has no current request")]
    MissingRequest,
    /// The operation only applies to exchanges answering a remote request.
    #[error("operation requires a remote-origin exchange")]
    NotRemote,
    /// Handing the message to the outbox failed.
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Errors returned by an [`Outbox`](crate::endpoint::Outbox).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SendError {
    /// The matcher rejected the outbound message.
    #[error("matcher rejected message: {0}")]
    Match(#[from] MatchError),
    /// The transport failed to write the message.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned when building a [`MatcherConfig`](crate::config::MatcherConfig).
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that drives periodic work was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending setting.
        field: &'static str,
    },
}

/// Canonical result alias used by the matcher's public APIs.
pub type Result<T> = std::result::Result<T, MatchError>;
