//! Type-erased, exchange-scoped attribute store.
//!
//! `ExchangeAttributes` lets any protocol layer stash per-exchange state under
//! a string key without the exchange knowing the value's type. Values are
//! stored as `Arc<dyn Any + Send + Sync>` so lookups hand out cheap clones and
//! the store can be shared across threads. The store lives and dies with its
//! exchange.

use std::{
    any::Any,
    borrow::Cow,
    sync::Arc,
};

use dashmap::{DashMap, mapref::entry::Entry};

type Value = Arc<dyn Any + Send + Sync>;

/// Concurrent key/value store attached to an [`Exchange`](super::Exchange).
///
/// # Examples
///
/// ```
/// use coap_matcher::exchange::ExchangeAttributes;
///
/// let attributes = ExchangeAttributes::default();
/// attributes.set("retransmissions", 2u32);
/// let count = attributes.get::<u32>("retransmissions").expect("value should exist");
/// assert_eq!(*count, 2);
/// ```
#[derive(Default)]
pub struct ExchangeAttributes {
    values: DashMap<Cow<'static, str>, Value>,
}

impl ExchangeAttributes {
    /// Retrieve the value stored under `key` if it has type `T`.
    ///
    /// # Returns
    /// `None` when nothing is stored under `key` or the stored value has a
    /// different type.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.values.get(key).map(|entry| Arc::clone(entry.value()))?;
        value.downcast::<T>().ok()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T>(&self, key: impl Into<Cow<'static, str>>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key.into(), Arc::new(value) as Value);
    }

    /// Return the value under `key`, inserting `make()` first if it is absent.
    ///
    /// The check and insert are atomic with respect to `key`: a value inserted
    /// concurrently is returned rather than overwritten, and `make` only runs
    /// when this call performs the insert.
    ///
    /// # Returns
    /// `None` when the value already stored under `key` is not a `T`.
    pub fn get_or_add<T>(&self, key: impl Into<Cow<'static, str>>, make: impl FnOnce() -> T) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = match self.values.entry(key.into()) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => {
                let value = Arc::new(make()) as Value;
                vacant.insert(Arc::clone(&value));
                value
            }
        };
        value.downcast::<T>().ok()
    }

    /// Remove the value under `key`, returning it if it was a `T`.
    pub fn remove<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let (_, value) = self.values.remove(key)?;
        value.downcast::<T>().ok()
    }

    /// True when a value of any type is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool { self.values.contains_key(key) }

    #[must_use]
    pub fn len(&self) -> usize { self.values.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl std::fmt::Debug for ExchangeAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.values.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        f.debug_struct("ExchangeAttributes").field("keys", &keys).finish()
    }
}
