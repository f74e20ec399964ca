//! Recognition of retransmitted inbound messages.
//!
//! A [`Deduplicator`] remembers which exchange each inbound message id
//! produced. Its one hard requirement is that
//! [`Deduplicator::find_or_register`] is atomic per key: of two concurrent
//! calls with the same key, exactly one registers and the other sees the
//! registered exchange.

mod crop_rotation;
mod noop;
mod periodic;
mod sweep;

use std::sync::Arc;

pub use crop_rotation::CropRotationDeduplicator;
pub use noop::NoopDeduplicator;
pub use sweep::SweepDeduplicator;

use crate::{
    config::{DeduplicatorKind, MatcherConfig},
    exchange::Exchange,
    key::KeyId,
};

/// Store of recently seen inbound message ids.
pub trait Deduplicator: Send + Sync + 'static {
    /// Register `exchange` under `key` unless another exchange is already
    /// registered there.
    ///
    /// Returns the previously registered exchange, or `None` when this call
    /// registered `exchange`.
    fn find_or_register(&self, key: KeyId, exchange: &Arc<Exchange>) -> Option<Arc<Exchange>>;

    /// Look up the exchange registered under `key` without registering.
    fn find(&self, key: &KeyId) -> Option<Arc<Exchange>>;

    /// Forget every registered exchange.
    fn clear(&self);

    /// Begin any periodic maintenance.
    fn start(&self) {}

    /// Stop periodic maintenance started by [`Deduplicator::start`].
    fn stop(&self) {}
}

/// Build the deduplicator selected by `config`.
#[must_use]
pub fn from_config(config: &MatcherConfig) -> Arc<dyn Deduplicator> {
    match config.deduplicator() {
        DeduplicatorKind::MarkAndSweep => Arc::new(SweepDeduplicator::new(
            config.exchange_lifetime(),
            config.mark_and_sweep_interval(),
        )),
        DeduplicatorKind::CropRotation => {
            Arc::new(CropRotationDeduplicator::new(config.crop_rotation_period()))
        }
        DeduplicatorKind::Noop => Arc::new(NoopDeduplicator),
    }
}
