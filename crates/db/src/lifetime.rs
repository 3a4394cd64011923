// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifetime management protocol (§4.2): deletable objects register a
//! [`LifetimeActor`] and are destroyed exactly once, after their holder
//! count reaches zero and their table-specific deletion readiness check
//! passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use vra_scheduler::{InstanceKey, TaskClassId, TaskScheduler};

/// A deletable object's retirement hooks.
///
/// `may_delete` must be cheap and side-effect free; it may be polled
/// repeatedly. `shutdown` runs once, before `destroy`, and may perform
/// blocking-free cleanup (detaching DBState, canceling timers). `destroy`
/// runs exactly once and performs the actual removal.
pub trait LifetimeActor: Send + Sync {
    fn may_delete(&self) -> bool;
    fn shutdown(&self);
    fn destroy(&self);
}

/// Periodically scans registered actors and retires the ones ready to go.
///
/// Modeled as a bounded, self-resubmitting unit of work under its own
/// scheduler instance key, exactly like a table shard's drain task (§5): a
/// scan pass never holds the scheduler's `db::DBTable` exclusion slot longer
/// than a single pass, so it never starves `FlowHandler`, `StatsCollector`
/// or the other classes `db::DBTable` excludes.
pub struct LifetimeManager {
    scheduler: Arc<TaskScheduler>,
    class_id: TaskClassId,
    instance_key: InstanceKey,
    interval: Duration,
    pending: Mutex<Vec<Arc<dyn LifetimeActor>>>,
    scanning: AtomicBool,
}

impl LifetimeManager {
    pub fn new(
        scheduler: Arc<TaskScheduler>,
        class_id: TaskClassId,
        instance_key: impl Into<InstanceKey>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            class_id,
            instance_key: instance_key.into(),
            interval,
            pending: Mutex::new(Vec::new()),
            scanning: AtomicBool::new(false),
        })
    }

    /// Register an actor for retirement consideration. Kicks off a scan loop
    /// if one isn't already running.
    pub fn register(self: &Arc<Self>, actor: Arc<dyn LifetimeActor>) {
        self.pending.lock().push(actor);
        if !self.scanning.swap(true, Ordering::AcqRel) {
            self.schedule_scan();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn schedule_scan(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let scheduler = Arc::clone(&this.scheduler);
        let class_id = this.class_id;
        let instance_key = this.instance_key.clone();
        scheduler.enqueue(class_id, instance_key, async move {
            this.scan_once();
        });
    }

    fn scan_once(self: Arc<Self>) {
        let mut retired = 0usize;
        {
            let mut pending = self.pending.lock();
            pending.retain(|actor| {
                if actor.may_delete() {
                    actor.shutdown();
                    actor.destroy();
                    retired += 1;
                    false
                } else {
                    true
                }
            });
        }
        if retired > 0 {
            debug!(count = retired, "lifetime manager retired entries");
        }

        // Held across the emptiness check and the `scanning` clear: a
        // `register` that pushes in between would otherwise see `scanning`
        // still true, stay silent, and then have this scan clear the flag
        // anyway, stranding its actor with no scan scheduled. Serializing
        // both on `pending`'s lock means a concurrent push either lands
        // before this check (seen, `scanning` stays set) or after the clear
        // is published (so its own `scanning` read is guaranteed `false`).
        let pending = self.pending.lock();
        if pending.is_empty() {
            self.scanning.store(false, Ordering::Release);
            return;
        }
        drop(pending);

        let this = self;
        let interval = this.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            this.schedule_scan();
        });
    }
}

#[cfg(test)]
#[path = "lifetime_tests.rs"]
mod tests;
