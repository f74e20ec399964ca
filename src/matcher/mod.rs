//! Message-to-exchange matching and index maintenance.
//!
//! The [`Matcher`] is the single source of truth for which [`Exchange`] a
//! wire message belongs to. It keeps three concurrent indexes:
//!
//! - by message id ([`KeyId`]), so ACK and RST messages find the confirmable
//!   message they answer;
//! - by token ([`KeyToken`]), so responses find the request that carried the
//!   token;
//! - by resource and peer ([`KeyUri`]), so the next block request of an
//!   ongoing blockwise transfer continues the same exchange.
//!
//! Inbound retransmissions are recognised through the configured
//! [`Deduplicator`]. Every exchange the matcher indexes gets a completion
//! listener that purges its entries, so completing an exchange is the only
//! way entries leave the tables besides being consumed by a match.

mod receive;
mod send;
mod tables;

use std::sync::{
    Arc,
    Weak,
    atomic::{AtomicU16, Ordering},
};

use tables::ExchangeTables;

use crate::{
    config::MatcherConfig,
    deduplication::{self, Deduplicator},
    exchange::Exchange,
    key::{KeyId, KeyToken, KeyUri},
};

/// Matches inbound and outbound messages to exchanges.
///
/// All operations are synchronous, bounded map operations and are safe to
/// call concurrently from any number of threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use coap_matcher::{
///     config::MatcherConfig,
///     exchange::{Exchange, Origin},
///     key::{KeyId, KeyToken},
///     matcher::Matcher,
///     message::{Code, Message, MessageType, Token},
/// };
///
/// let matcher = Matcher::new(MatcherConfig::default());
/// let token = Token::new(vec![0xab]).expect("short token");
/// let request = Arc::new(
///     Message::request(MessageType::Con, Code::GET)
///         .with_id(5)
///         .with_token(token.clone()),
/// );
/// let exchange = Arc::new(Exchange::new(Arc::clone(&request), Origin::Local));
/// matcher.send_request(&exchange, &request);
///
/// assert!(matcher.find_by_id(&KeyId::local(5)).is_some());
/// exchange.set_complete();
/// assert!(matcher.find_by_token(&KeyToken::new(token)).is_none());
/// ```
pub struct Matcher {
    tables: Arc<ExchangeTables>,
    current_id: AtomicU16,
    deduplicator: Arc<dyn Deduplicator>,
}

impl Matcher {
    /// Create a matcher using the deduplicator selected by `config`.
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        let deduplicator = deduplication::from_config(&config);
        Self::with_deduplicator(&config, deduplicator)
    }

    /// Create a matcher around an existing deduplicator.
    #[must_use]
    pub fn with_deduplicator(config: &MatcherConfig, deduplicator: Arc<dyn Deduplicator>) -> Self {
        let first_id = if config.use_random_id_start() {
            rand::random::<u16>()
        } else {
            0
        };
        Self {
            tables: Arc::new(ExchangeTables::default()),
            current_id: AtomicU16::new(first_id),
            deduplicator,
        }
    }

    /// Start the deduplicator's periodic maintenance.
    pub fn start(&self) { self.deduplicator.start(); }

    /// Stop the deduplicator's periodic maintenance.
    pub fn stop(&self) { self.deduplicator.stop(); }

    /// Drop every indexed exchange and every deduplication record.
    pub fn clear(&self) {
        self.tables.clear();
        self.deduplicator.clear();
    }

    /// Draw the next message id, wrapping modulo 2^16.
    pub fn next_id(&self) -> u16 { self.current_id.fetch_add(1, Ordering::Relaxed) }

    /// The deduplicator consulted on the receive path.
    #[must_use]
    pub fn deduplicator(&self) -> &Arc<dyn Deduplicator> { &self.deduplicator }

    /// Exchange indexed under `key` in the id table.
    #[must_use]
    pub fn find_by_id(&self, key: &KeyId) -> Option<Arc<Exchange>> {
        self.tables.by_id.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Exchange indexed under `key` in the token table.
    #[must_use]
    pub fn find_by_token(&self, key: &KeyToken) -> Option<Arc<Exchange>> {
        self.tables.by_token.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Exchange of the blockwise transfer indexed under `key`.
    #[must_use]
    pub fn find_ongoing(&self, key: &KeyUri) -> Option<Arc<Exchange>> {
        self.tables.ongoing.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Sizes of the id, token and ongoing tables, in that order.
    #[must_use]
    pub fn table_sizes(&self) -> (usize, usize, usize) {
        (
            self.tables.by_id.len(),
            self.tables.by_token.len(),
            self.tables.ongoing.len(),
        )
    }

    /// Undo inserts that raced with the exchange's completion.
    ///
    /// Completion listeners run once, so entries inserted after they ran
    /// would otherwise outlive the exchange.
    fn purge_if_complete(&self, exchange: &Exchange) {
        if exchange.is_complete() {
            self.tables.purge(exchange);
        }
    }

    /// Subscribe the table cleanup to `exchange`'s completion, once.
    fn track(&self, exchange: &Exchange) {
        if !exchange.claim_tracking() {
            return;
        }
        let tables: Weak<ExchangeTables> = Arc::downgrade(&self.tables);
        exchange.on_complete(move |completed| {
            if let Some(tables) = tables.upgrade() {
                tables.on_completed(completed);
            }
        });
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (by_id, by_token, ongoing) = self.table_sizes();
        f.debug_struct("Matcher")
            .field("by_id", &by_id)
            .field("by_token", &by_token)
            .field("ongoing", &ongoing)
            .field("current_id", &self.current_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
