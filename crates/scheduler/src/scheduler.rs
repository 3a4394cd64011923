// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task scheduler (§4.1).
//!
//! Multiplexes all agent work onto the ambient tokio runtime while
//! guaranteeing the three rules of §4.1: intra-instance serialization,
//! cross-class exclusion, and FIFO-within-instance ordering.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error};
use vra_core::AgentError;

use crate::class::{Policy, TaskClassId};
use crate::task::{InstanceKey, TaskFuture};

#[derive(Default)]
struct Inner {
    policy: Policy,
    /// Every class that has ever had a task enqueued; used to reject
    /// conflicting re-registration (§3 invariant, class closed for mutation
    /// once in use).
    used_classes: HashSet<TaskClassId>,
    /// FIFO queue per `(class, instance_key)`.
    queues: HashMap<(TaskClassId, InstanceKey), VecDeque<TaskFuture>>,
    /// Instance keys with a task currently executing.
    active_instances: HashSet<(TaskClassId, InstanceKey)>,
    /// Count of currently-running tasks per class, used for the exclusion
    /// check. Multiple instance keys of the *same* class may run at once;
    /// only cross-class exclusion limits concurrency.
    run_counts: HashMap<TaskClassId, usize>,
}

impl Inner {
    fn is_runnable(&self, class: TaskClassId) -> bool {
        self.policy
            .excludes(class)
            .iter()
            .all(|excluded| self.run_counts.get(excluded).copied().unwrap_or(0) == 0)
    }
}

/// The process-wide concurrency arbiter (§9: "the process-wide scheduler is
/// the only true singleton"). Constructed once at bootstrap and shared by
/// reference with every other component.
pub struct TaskScheduler {
    inner: Mutex<Inner>,
}

impl TaskScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(Inner::default()) })
    }

    /// Register a task class with its exclusion set (§4.1). Idempotent for
    /// an unchanged exclusion set; registering the same name with a
    /// different set after the class has run tasks is an
    /// `InvariantViolation`.
    pub fn register_class(&self, name: &str, excludes: &[&str]) -> Result<TaskClassId, AgentError> {
        let mut inner = self.inner.lock();
        let used = inner.used_classes.clone();
        inner.policy.register(name, excludes, &used)
    }

    /// Install exactly the exclusion table required by §4.1.
    pub fn install_default_policy(&self) -> Result<(), AgentError> {
        crate::policy::install_default_policy(self)
    }

    pub fn class_id(&self, name: &str) -> Option<TaskClassId> {
        self.inner.lock().policy.class_id(name)
    }

    /// Whether `a` and `b` are mutually excluded under the current policy.
    pub fn is_excluded(&self, a: TaskClassId, b: TaskClassId) -> bool {
        self.inner.lock().policy.is_excluded(a, b)
    }

    /// Submit a unit of work tagged `(class, instance_key)`.
    pub fn enqueue(
        self: &Arc<Self>,
        class: TaskClassId,
        instance_key: impl Into<InstanceKey>,
        fut: impl std::future::Future<Output = ()> + Send + 'static,
    ) {
        let instance_key = instance_key.into();
        {
            let mut inner = self.inner.lock();
            inner.used_classes.insert(class);
            inner
                .queues
                .entry((class, instance_key))
                .or_default()
                .push_back(Box::pin(fut));
        }
        self.drive();
    }

    /// Re-examine every queue and start whatever is runnable. Called after
    /// every enqueue and after every task completion, since a finishing task
    /// may unblock instances of other classes that were excluded by it.
    fn drive(self: &Arc<Self>) {
        let mut to_start: Vec<(TaskClassId, InstanceKey, TaskFuture)> = Vec::new();
        {
            let mut inner = self.inner.lock();
            let keys: Vec<(TaskClassId, InstanceKey)> = inner
                .queues
                .iter()
                .filter(|(_, q)| !q.is_empty())
                .map(|(k, _)| k.clone())
                .collect();

            for key in keys {
                if inner.active_instances.contains(&key) {
                    continue;
                }
                let (class, _) = &key;
                if !inner.is_runnable(*class) {
                    continue;
                }
                let Some(fut) = inner.queues.get_mut(&key).and_then(|q| q.pop_front()) else {
                    continue;
                };
                inner.active_instances.insert(key.clone());
                *inner.run_counts.entry(*class).or_insert(0) += 1;
                to_start.push((key.0, key.1, fut));
            }
        }

        for (class, instance_key, fut) in to_start {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let class_name = {
                    let inner = this.inner.lock();
                    inner.policy.name(class).to_string()
                };
                debug!(class = %class_name, instance = %instance_key, "task started");
                let result = AssertUnwindSafe(fut).catch_unwind().await;
                if let Err(panic) = result {
                    let msg = panic_message(&panic);
                    error!(class = %class_name, instance = %instance_key, %msg, "task panicked");
                }
                this.on_complete(class, instance_key);
            });
        }
    }

    fn on_complete(self: &Arc<Self>, class: TaskClassId, instance_key: InstanceKey) {
        {
            let mut inner = self.inner.lock();
            inner.active_instances.remove(&(class, instance_key));
            if let Some(count) = inner.run_counts.get_mut(&class) {
                *count = count.saturating_sub(1);
            }
        }
        self.drive();
    }

    /// Number of distinct `(class, instance_key)` queues with pending or
    /// in-flight work. Exposed for tests and diagnostic dumps (§7).
    pub fn pending_instances(&self) -> usize {
        let inner = self.inner.lock();
        inner.queues.values().filter(|q| !q.is_empty()).count() + inner.active_instances.len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
