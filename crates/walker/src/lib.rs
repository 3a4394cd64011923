// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vra-walker: asynchronous table iteration (§4.4).
//!
//! A [`Walker`] submits one scheduler task per shard, under the owning
//! table's class and a per-shard instance key, so a scan never races that
//! shard's own drain task (§5: both are instance-keyed to the same class,
//! so the scheduler serializes them). Each shard task iterates a
//! point-in-time snapshot of that shard's entries synchronously, then the
//! walker's `done_fn` runs once all shards finish.

mod composite;
mod walker;

pub use composite::CompositeWalk;
pub use walker::{walk_table, WalkControl, WalkId, Walker};
