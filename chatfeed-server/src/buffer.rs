//! Capacity-bounded, sorted, append-only buffer.
//!
//! [`BoundedOrderedBuffer`] keeps the `limit` largest elements it has ever
//! seen according to a caller-supplied ordering key. Elements with equal keys
//! are the same element: inserting one again replaces it in place. The final
//! contents depend only on the set of inserted elements, never on the order
//! they arrived in, which is what lets live deliveries and history backfill
//! race into the same buffer.

use std::{collections::BTreeMap, fmt};

use shared::models::Message;
use thiserror::Error;

/// Errors raised when constructing a buffer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The requested capacity cannot hold a single element.
    #[error("invalid argument: buffer limit must be at least 1, got {0}")]
    InvalidArgument(usize),
}

/// Keeps the top `limit` elements by key, in ascending key order.
pub struct BoundedOrderedBuffer<T, K, F = fn(&T) -> K> {
    limit: usize,
    items: BTreeMap<K, T>,
    key: F,
}

/// Bounded window of channel messages ordered by sequence number.
pub type MessageWindow = BoundedOrderedBuffer<Message, i64>;

impl<T, K, F> BoundedOrderedBuffer<T, K, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    /// Creates an empty buffer holding at most `limit` elements.
    ///
    /// # Errors
    /// Returns [`BufferError::InvalidArgument`] when `limit` is zero.
    pub fn new(limit: usize, key: F) -> Result<Self, BufferError> {
        if limit < 1 {
            return Err(BufferError::InvalidArgument(limit));
        }
        Ok(Self {
            limit,
            items: BTreeMap::new(),
            key,
        })
    }

    /// Inserts `item`, replacing any element with an equal key, then evicts
    /// the minimum if the buffer grew past its limit.
    ///
    /// When the buffer is full and `item` sorts below every held element,
    /// `item` itself is the one evicted.
    pub fn insert(&mut self, item: T) {
        let key = (self.key)(&item);
        self.items.insert(key, item);
        if self.items.len() > self.limit {
            self.items.pop_first();
        }
    }

    /// Inserts every item in iteration order, trimming after each one so the
    /// buffer never holds more than `limit` elements, even mid-batch.
    pub fn insert_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.insert(item);
        }
    }

    /// Largest element, if any.
    pub fn max_item(&self) -> Option<&T> {
        self.items.last_key_value().map(|(_, item)| item)
    }

    /// Copies all held elements in ascending order.
    ///
    /// The returned vector is independent of the buffer; later insertions do
    /// not affect it.
    pub fn snapshot_ordered(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.values().cloned().collect()
    }

    /// Number of held elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of elements retained.
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

impl MessageWindow {
    /// Window over channel messages keyed by [`Message::order_key`].
    ///
    /// # Errors
    /// Returns [`BufferError::InvalidArgument`] when `limit` is zero.
    pub fn for_messages(limit: usize) -> Result<Self, BufferError> {
        Self::new(limit, Message::order_key)
    }
}

impl<T, K, F> fmt::Debug for BoundedOrderedBuffer<T, K, F>
where
    T: fmt::Debug,
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedOrderedBuffer")
            .field("limit", &self.limit)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}
