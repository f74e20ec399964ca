use std::sync::Arc;

use super::Deduplicator;
use crate::{exchange::Exchange, key::KeyId};

/// Deduplicator that remembers nothing; every message is treated as new.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDeduplicator;

impl Deduplicator for NoopDeduplicator {
    fn find_or_register(&self, _key: KeyId, _exchange: &Arc<Exchange>) -> Option<Arc<Exchange>> {
        None
    }

    fn find(&self, _key: &KeyId) -> Option<Arc<Exchange>> { None }

    fn clear(&self) {}
}
