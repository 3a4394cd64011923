// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The flow table's [`TableHooks`] implementation — the flow table is an
//! ordinary [`vra_db::Table`] instance, not a parallel mechanism (§4.5).

use std::sync::Arc;

use tracing::trace;
use vra_db::{Entry, TableHooks};

use crate::types::{FlowEntry, FlowKey};

/// Table-specific hooks for the flow table. Flow entries need no
/// transformation on insert/update beyond what the aging loop itself
/// mutates in place, so this mostly traces lifecycle events for
/// diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowHooks;

impl TableHooks<FlowKey, FlowEntry> for FlowHooks {
    fn add(&self, entry: &Arc<Entry<FlowKey, FlowEntry>>) {
        trace!(flow = ?entry.key(), "flow installed");
    }

    fn delete(&self, entry: &Arc<Entry<FlowKey, FlowEntry>>) {
        trace!(flow = ?entry.key(), "flow torn down");
    }
}

/// A `vra_db::Table` specialized for flow entries (§4.5).
pub type FlowTable = vra_db::Table<FlowKey, FlowEntry, FlowHooks>;
