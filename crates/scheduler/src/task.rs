// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task envelopes (§3 "Task").

use std::future::Future;
use std::pin::Pin;

/// The instance key a task is tagged with, alongside its class (§3).
///
/// Two tasks with the same `(class, instance_key)` never run concurrently
/// and run in FIFO submission order; tasks with distinct instance keys of
/// the same class may run in parallel subject to the exclusion policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(pub String);

impl InstanceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Instance key for a table shard task (§3: `(table_id, shard_id)`).
    pub fn shard(table_id: &str, shard_id: usize) -> Self {
        Self(format!("{table_id}#{shard_id}"))
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstanceKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A boxed, type-erased unit of work submitted to the scheduler.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
