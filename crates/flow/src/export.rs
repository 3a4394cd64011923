// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The export sink collaborator (§6) and the `FlowDataIpv4` record it
//! consumes.

use std::net::Ipv4Addr;

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

/// One exported flow-statistics record (§6). Only `flowuuid` is required;
/// everything else is best-effort and may be absent (e.g. `vm` when the
/// interface lookup that would resolve it is out of scope, §1).
#[derive(Debug, Clone)]
pub struct FlowDataIpv4 {
    pub flowuuid: Uuid,
    pub sourceip: Option<Ipv4Addr>,
    pub destip: Option<Ipv4Addr>,
    pub protocol: Option<u8>,
    pub sport: Option<u16>,
    pub dport: Option<u16>,
    pub sourcevn: Option<String>,
    pub destvn: Option<String>,
    pub vm: Option<String>,
    pub bytes: Option<u64>,
    pub packets: Option<u64>,
    pub diff_bytes: Option<u64>,
    pub diff_packets: Option<u64>,
    pub reverse_uuid: Option<Uuid>,
    pub setup_time: Option<u64>,
    pub teardown_time: Option<u64>,
    pub direction_ing: u8,
}

/// Consumes exported flow records (§6). `export` must not block the aging
/// loop (§7: "the aging loop never blocks on export") — implementations
/// that can fill up (e.g. a bounded channel) drop and log rather than wait.
pub trait FlowExportSink: Send + Sync {
    fn export(&self, record: FlowDataIpv4);
}

/// Forwards records over a bounded `tokio::sync::mpsc` channel, decoupling a
/// hot loop from a slower consumer. A full channel drops the record and logs rather than
/// applying backpressure to the aging loop (§7 "export failures are
/// silently retried on the next pass").
pub struct ChannelExportSink {
    sender: tokio::sync::mpsc::Sender<FlowDataIpv4>,
}

impl ChannelExportSink {
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<FlowDataIpv4>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl FlowExportSink for ChannelExportSink {
    fn export(&self, record: FlowDataIpv4) {
        if let Err(err) = self.sender.try_send(record) {
            warn!(%err, "dropping flow export record, sink is backed up");
        }
    }
}

/// Records every export in memory, for tests.
#[derive(Default)]
pub struct RecordingExportSink {
    records: Mutex<Vec<FlowDataIpv4>>,
}

impl RecordingExportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<FlowDataIpv4> {
        std::mem::take(&mut self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FlowExportSink for RecordingExportSink {
    fn export(&self, record: FlowDataIpv4) {
        self.records.lock().push(record);
    }
}
