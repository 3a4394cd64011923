// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vra_core::define_id;
use vra_db::{Entry, Table, TableHooks};
use vra_scheduler::InstanceKey;

define_id! {
    /// Identifies a single in-flight or completed table walk (§3 "Walker").
    pub struct WalkId("wlk-");
}

/// What an `entry_fn` callback wants to happen next (§7: "walker callbacks
/// may abort their walk by returning a cancel-equivalent" — a normal value,
/// not a `Result`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Cancel,
}

type DoneFn = Box<dyn FnOnce(WalkId, bool) + Send>;

struct WalkState {
    cancel: Arc<AtomicBool>,
    remaining_shards: AtomicUsize,
    done: Mutex<Option<DoneFn>>,
}

/// Drives asynchronous iterations over a single table (§4.4).
///
/// One `Walker` can drive any number of concurrent, independently
/// cancellable walks; each call to [`Walker::walk`] gets its own
/// [`WalkId`] and tracking state, registered here so a later
/// [`Walker::cancel`] by id can find it.
pub struct Walker<K, V, H> {
    table: Table<K, V, H>,
    active: Mutex<HashMap<WalkId, Arc<WalkState>>>,
}

impl<K, V, H> Walker<K, V, H>
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    pub fn new(table: Table<K, V, H>) -> Arc<Self> {
        Arc::new(Self { table, active: Mutex::new(HashMap::new()) })
    }

    /// `WalkTable(table, entry_fn, done_fn) -> WalkId` (§4.4).
    ///
    /// Submits one scheduler task per shard, instance-keyed identically to
    /// that shard's drain task so a scan and a concurrent mutation of the
    /// same shard never interleave (§4.4: "concurrent modifications to a
    /// shard never yield torn reads because walker callbacks run on the
    /// same shard task"). `done_fn` runs exactly once, after every shard
    /// has either finished or observed cancellation.
    pub fn walk(
        self: &Arc<Self>,
        entry_fn: impl Fn(usize, &Arc<Entry<K, V>>) -> WalkControl + Send + Sync + 'static,
        done_fn: impl FnOnce(WalkId, bool) + Send + 'static,
    ) -> WalkId {
        let id = WalkId::new();
        let shard_count = self.table.shard_count();
        let state = Arc::new(WalkState {
            cancel: Arc::new(AtomicBool::new(false)),
            remaining_shards: AtomicUsize::new(shard_count),
            done: Mutex::new(Some(Box::new(done_fn))),
        });
        self.active.lock().insert(id, Arc::clone(&state));

        let entry_fn = Arc::new(entry_fn);
        let table_name = self.table.name().to_string();
        let class_id = self.table.class_id();
        let scheduler = Arc::clone(self.table.scheduler());
        let this = Arc::clone(self);

        for idx in 0..shard_count {
            let table = self.table.clone();
            let entry_fn = Arc::clone(&entry_fn);
            let state = Arc::clone(&state);
            let this = Arc::clone(&this);
            let instance_key = InstanceKey::shard(&table_name, idx);
            scheduler.enqueue(class_id, instance_key, async move {
                scan_shard(idx, &table, &entry_fn, &state);
                this.finish_shard(id, &state);
            });
        }

        id
    }

    fn finish_shard(&self, id: WalkId, state: &Arc<WalkState>) {
        if state.remaining_shards.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        self.active.lock().remove(&id);
        let cancelled = state.cancel.load(Ordering::Acquire);
        if let Some(done) = state.done.lock().take() {
            done(id, cancelled);
        }
    }

    /// `WalkCancel(id)`: sets the cancel flag checked between entries in
    /// every shard task belonging to this walk. `done_fn` still fires
    /// exactly once once the in-flight shard tasks notice it (§4.4).
    pub fn cancel(&self, id: WalkId) {
        if let Some(state) = self.active.lock().get(&id) {
            state.cancel.store(true, Ordering::Release);
        }
    }

    pub fn is_active(&self, id: WalkId) -> bool {
        self.active.lock().contains_key(&id)
    }
}

fn scan_shard<K, V, H>(
    idx: usize,
    table: &Table<K, V, H>,
    entry_fn: &Arc<impl Fn(usize, &Arc<Entry<K, V>>) -> WalkControl + Send + Sync + 'static>,
    state: &Arc<WalkState>,
) where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    let snapshot = table.shard_snapshot(idx);
    for entry in &snapshot {
        if state.cancel.load(Ordering::Acquire) {
            return;
        }
        if entry.is_deleted() {
            continue;
        }
        if entry_fn(idx, entry) == WalkControl::Cancel {
            state.cancel.store(true, Ordering::Release);
            return;
        }
    }
}

/// Free-function convenience wrapper matching the `WalkTable(...)` contract
/// (§4.4) for one-shot callers that don't need to hold onto a
/// [`Walker`] to issue later cancellations.
pub fn walk_table<K, V, H>(
    table: &Table<K, V, H>,
    entry_fn: impl Fn(usize, &Arc<Entry<K, V>>) -> WalkControl + Send + Sync + 'static,
    done_fn: impl FnOnce(WalkId, bool) + Send + 'static,
) -> (Arc<Walker<K, V, H>>, WalkId)
where
    K: Clone + Eq + Ord + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: TableHooks<K, V> + Clone + 'static,
{
    let walker = Walker::new(table.clone());
    let id = walker.walk(entry_fn, done_fn);
    (Arc::clone(&walker), id)
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
