// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::listener::ListenerId;

/// Monotonically-allocated per-table entry id (§8 scenario 1).
pub type EntryId = u64;

/// What happened to an entry, delivered to every registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Add,
    Change,
    Delete,
}

/// A reference-counted table row.
///
/// The "reference count" tracked here (`holder_count`) is a domain concept,
/// distinct from `Arc`'s own strong count: the table itself, and any
/// in-flight notification, hold an `Arc<Entry<K, V>>` purely for memory
/// safety, but that is not a "holder" in the §4.2 sense. Callers that intend
/// to keep using an entry beyond the scheduler task that looked it up must
/// call [`Entry::acquire`] and later [`Entry::release`].
pub struct Entry<K, V> {
    pub(crate) id: EntryId,
    key: K,
    payload: RwLock<V>,
    deleted: AtomicBool,
    retired: AtomicBool,
    holders: AtomicUsize,
    dbstate: RwLock<HashMap<ListenerId, Box<dyn Any + Send + Sync>>>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(id: EntryId, key: K, payload: V) -> Self {
        Self {
            id,
            key,
            payload: RwLock::new(payload),
            deleted: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            holders: AtomicUsize::new(0),
            dbstate: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn mark_retired(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Take out a holder reference (§4.2: "Destroy() runs only after every
    /// holder has released and MayDelete() is true").
    pub fn acquire(&self) {
        self.holders.fetch_add(1, Ordering::AcqRel);
    }

    /// Release a previously acquired holder reference.
    pub fn release(&self) {
        self.holders.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn holder_count(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }
}

impl<K, V: Clone> Entry<K, V> {
    pub fn snapshot(&self) -> V {
        self.payload.read().clone()
    }
}

impl<K, V> Entry<K, V> {
    pub(crate) fn set_payload(&self, value: V) {
        *self.payload.write() = value;
    }

    /// Mutate the payload in place under the entry's write lock. Used by
    /// consumers (e.g. the flow aging loop) that update a handful of fields
    /// on every pass rather than replacing the whole value via `enqueue`.
    pub fn update_payload(&self, f: impl FnOnce(&mut V)) {
        f(&mut self.payload.write());
    }

    pub fn with_payload<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.payload.read())
    }

    /// Attach an opaque per-listener side table, as used by walkers and
    /// export sinks to remember where they left off on this entry.
    pub fn set_state(&self, listener: ListenerId, state: Box<dyn Any + Send + Sync>) {
        self.dbstate.write().insert(listener, state);
    }

    pub fn clear_state(&self, listener: ListenerId) {
        self.dbstate.write().remove(&listener);
    }

    pub fn has_state(&self, listener: ListenerId) -> bool {
        self.dbstate.read().contains_key(&listener)
    }

    pub fn with_state<T: 'static, R>(&self, listener: ListenerId, f: impl FnOnce(Option<&T>) -> R) -> R {
        let guard = self.dbstate.read();
        f(guard.get(&listener).and_then(|b| b.downcast_ref::<T>()))
    }
}
