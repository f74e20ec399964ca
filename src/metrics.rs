//! Metric helpers for `coap_matcher`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::exchange::Origin;

/// Name of the counter tracking inbound messages resolved to an exchange.
pub const MESSAGES_MATCHED: &str = "coap_matcher_messages_matched_total";
/// Name of the counter tracking inbound messages recognised as duplicates.
pub const DUPLICATES_TOTAL: &str = "coap_matcher_duplicates_total";
/// Name of the counter tracking inbound messages with no matching exchange.
pub const UNMATCHED_TOTAL: &str = "coap_matcher_unmatched_total";
/// Name of the counter tracking exchanges purged on completion.
pub const EXCHANGES_COMPLETED: &str = "coap_matcher_exchanges_completed_total";

/// Kind of inbound message a metric refers to.
#[derive(Clone, Copy, Debug)]
pub enum Inbound {
    /// A request.
    Request,
    /// A response.
    Response,
    /// An empty ACK or RST.
    Empty,
}

impl Inbound {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Inbound::Request => "request",
            Inbound::Response => "response",
            Inbound::Empty => "empty",
        }
    }
}

/// Record an inbound message resolved to an exchange.
pub fn inc_matched(kind: Inbound) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_MATCHED, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record an inbound duplicate.
pub fn inc_duplicates(kind: Inbound) {
    #[cfg(feature = "metrics")]
    counter!(DUPLICATES_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record an inbound message that matched nothing.
pub fn inc_unmatched(kind: Inbound) {
    #[cfg(feature = "metrics")]
    counter!(UNMATCHED_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record an exchange purged from the tables.
pub fn inc_completed(origin: Origin) {
    #[cfg(feature = "metrics")]
    counter!(EXCHANGES_COMPLETED, "origin" => origin.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = origin;
}
