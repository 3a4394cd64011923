// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel flow table collaborator (§6).
//!
//! The real transport (netlink socket / mmap'd array) is out of scope (§1);
//! this crate only names the interface the aging loop reads through, plus
//! test doubles.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::FlowHandle;

/// One kernel-side flow record, as read by index (§6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelFlowRecord {
    pub bytes: u32,
    pub packets: u32,
    pub bytes_oflow: u16,
    pub packets_oflow: u8,
}

/// Read-only view of the kernel-resident flow table (§5: "read-only from
/// the aging loop; written only via the `KSync` class").
pub trait KernelFlowTable: Send + Sync {
    fn read(&self, handle: FlowHandle) -> Option<KernelFlowRecord>;
}

/// A kernel flow table with nothing in it; every `read` returns `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKernelFlowTable;

impl KernelFlowTable for NullKernelFlowTable {
    fn read(&self, _handle: FlowHandle) -> Option<KernelFlowRecord> {
        None
    }
}

/// An in-memory stand-in for the real transport, used by tests to control
/// exactly what a given flow handle reads back (wraparound, slot reuse,
/// absence).
#[derive(Debug, Default)]
pub struct MockKernelFlowTable {
    records: RwLock<HashMap<FlowHandle, KernelFlowRecord>>,
}

impl MockKernelFlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, handle: FlowHandle, record: KernelFlowRecord) {
        self.records.write().insert(handle, record);
    }

    pub fn remove(&self, handle: FlowHandle) {
        self.records.write().remove(&handle);
    }
}

impl KernelFlowTable for MockKernelFlowTable {
    fn read(&self, handle: FlowHandle) -> Option<KernelFlowRecord> {
        self.records.read().get(&handle).copied()
    }
}
