// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Walk-of-walks composition (§4.4, §9 "callback-heavy walker composition").
//!
//! Models a composite operation such as "delete all routes learned from peer
//! P" — an outer walker whose `entry_fn` spawns one inner walker per entry
//! (e.g. one route-table walk per VRF) — as an explicit state value instead
//! of a pyramid of nested closures, so its progress (how many inner walks
//! are still outstanding) is observable rather than buried in callback
//! captures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::walker::WalkId;

type Completion = Box<dyn FnOnce(WalkId) + Send>;

/// Tracks one outer walk's fan-out of inner walks.
///
/// Usage: call [`CompositeWalk::new`] when the outer walk starts,
/// [`CompositeWalk::spawn_inner`] once per inner walk the outer `entry_fn`
/// launches, have each inner walk's `done_fn` call
/// [`CompositeWalk::inner_done`], and call [`CompositeWalk::seal`] from the
/// outer walk's own `done_fn` once it knows no further inner walks will be
/// spawned. The completion callback fires exactly once, whichever of
/// "sealed with zero pending" or "last pending inner walk finishes after
/// sealing" happens last.
pub struct CompositeWalk {
    outer_id: WalkId,
    pending_inner: AtomicUsize,
    sealed: AtomicBool,
    completion: Mutex<Option<Completion>>,
}

impl CompositeWalk {
    pub fn new(outer_id: WalkId, on_complete: impl FnOnce(WalkId) + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            outer_id,
            pending_inner: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
            completion: Mutex::new(Some(Box::new(on_complete))),
        })
    }

    pub fn outer_id(&self) -> WalkId {
        self.outer_id
    }

    /// Record that one more inner walk has been spawned. Must be called
    /// before the outer walk calls [`CompositeWalk::seal`].
    pub fn spawn_inner(self: &Arc<Self>) {
        self.pending_inner.fetch_add(1, Ordering::AcqRel);
    }

    /// Record that one previously-spawned inner walk has finished.
    pub fn inner_done(self: &Arc<Self>) {
        let remaining = self.pending_inner.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && self.sealed.load(Ordering::Acquire) {
            self.fire();
        }
    }

    /// The outer walk has finished iterating and will spawn no further
    /// inner walks; fires completion immediately if every inner walk
    /// spawned so far has already finished.
    pub fn seal(self: &Arc<Self>) {
        self.sealed.store(true, Ordering::Release);
        if self.pending_inner.load(Ordering::Acquire) == 0 {
            self.fire();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending_inner.load(Ordering::Acquire)
    }

    fn fire(self: &Arc<Self>) {
        if let Some(on_complete) = self.completion.lock().take() {
            on_complete(self.outer_id);
        }
    }
}
