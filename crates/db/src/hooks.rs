// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::entry::Entry;

/// Table-specific capability set, dispatched by [`crate::Table`] at each
/// stage of a request's lifecycle (§9: "dynamic dispatch over heterogeneous
/// table hooks").
///
/// Every method has a default so a `Table` can be stood up with the unit
/// hook type `()` for tests that only exercise scheduling and notification
/// ordering.
pub trait TableHooks<K, V>: Send + Sync {
    /// Transform request payload into the value actually stored, run before
    /// either `add` or `on_change`.
    fn alloc(&self, _key: &K, data: V) -> V {
        data
    }

    /// Called once, right after a brand new entry is inserted.
    fn add(&self, _entry: &Arc<Entry<K, V>>) {}

    /// Called when an existing, non-deleted entry is overwritten.
    fn on_change(&self, _entry: &Arc<Entry<K, V>>, _new_data: &V) {}

    /// Called once, right after an entry is marked deleted (before
    /// notification and before the lifetime actor is registered).
    fn delete(&self, _entry: &Arc<Entry<K, V>>) {}

    /// Whether a listener notification should actually be delivered for this
    /// entry right now. Lets a hook suppress notification of entries it
    /// considers not yet externally visible.
    fn can_notify(&self, _entry: &Arc<Entry<K, V>>) -> bool {
        true
    }

    /// Translate an external config-graph node into a request against this
    /// table. Config ingestion itself is out of scope; this is a named
    /// extension point for callers that bridge an external graph.
    fn ifnode_to_req(&self) {}
}

impl<K: Send + Sync, V: Send + Sync> TableHooks<K, V> for () {}

/// Consulted by a table when an entry retires, to support re-creation of an
/// entry whose `Delete` raced with a pending `Add` for the same key (§4.3
/// reuse protocol).
pub trait ResyncSource<K, V>: Send + Sync {
    fn pending_recreate(&self, key: &K) -> Option<V>;
}
