#![doc(html_root_url = "https://docs.rs/coap_matcher/latest")]
//! Public API for the `coap_matcher` library.
//!
//! This crate implements the exchange bookkeeping of a CoAP endpoint: the
//! [`Exchange`] record for each request/response interaction and the
//! [`Matcher`] that binds every inbound and outbound message to its exchange,
//! recognises retransmissions and purges exchanges once they complete.
//! Wire encoding, retransmission timers and the blockwise and observe layers
//! live elsewhere; this crate only consumes the message metadata they set.

pub mod blockwise;
pub mod config;
pub mod deduplication;
pub mod endpoint;
pub mod error;
pub mod exchange;
pub mod key;
pub mod matcher;
pub mod message;
pub mod metrics;
pub mod observe;
mod sync;

pub use config::{DeduplicatorKind, MatcherConfig};
pub use deduplication::Deduplicator;
pub use endpoint::{Endpoint, MessageDeliverer, Outbox};
/// Result type alias re-exported for convenience when calling the matcher.
pub use error::Result;
pub use error::{ConfigError, ExchangeError, MatchError, SendError};
pub use exchange::{Exchange, Origin};
pub use key::{KeyId, KeyToken, KeyUri};
pub use matcher::Matcher;
pub use message::{BlockOption, Code, Message, MessageType, Token};
pub use observe::ObserveRelation;
