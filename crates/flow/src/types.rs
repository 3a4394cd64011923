// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The flow table's key and payload types (§3 "FlowEntry").

use std::net::Ipv4Addr;

use uuid::Uuid;

/// Index into the kernel-resident flow table (§3, §6).
pub type FlowHandle = u32;

/// `(src_ip, dst_ip, proto, src_port, dst_port)` — the userspace shadow's
/// key, total-ordered so it can live in a [`vra_db::Table`] (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub proto: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, proto: u8, src_port: u16, dst_port: u16) -> Self {
        Self { src_ip, dst_ip, proto, src_port, dst_port }
    }
}

/// Flags carried by a [`FlowEntry`] (§3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowFlags {
    /// This record describes traffic entering the vrouter (as opposed to
    /// leaving it); the reverse flow, if any, has the opposite direction.
    pub ingress: bool,
    /// Both endpoints of this flow sit on this host.
    pub local: bool,
    /// This flow's addressing was network-address-translated.
    pub nat: bool,
    /// Retire immediately after the next export (§4.5 "short-flow shortcut").
    pub short_flow: bool,
}

/// The userspace shadow of one kernel flow (§3).
#[derive(Debug, Clone)]
pub struct FlowEntry {
    pub bytes: u64,
    pub packets: u64,
    pub last_modified_time_ms: u64,
    pub setup_time_ms: u64,
    pub teardown_time_ms: Option<u64>,
    pub reverse_flow: Option<FlowKey>,
    pub flags: FlowFlags,
    pub flow_handle: FlowHandle,
    pub uuid_primary: Uuid,
    pub uuid_egress: Uuid,
    pub source_vn: String,
    pub dest_vn: String,
    pub vm: Option<String>,
}

impl FlowEntry {
    pub fn new(flow_handle: FlowHandle, setup_time_ms: u64, source_vn: String, dest_vn: String) -> Self {
        Self {
            bytes: 0,
            packets: 0,
            last_modified_time_ms: setup_time_ms,
            setup_time_ms,
            teardown_time_ms: None,
            reverse_flow: None,
            flags: FlowFlags::default(),
            flow_handle,
            uuid_primary: Uuid::new_v4(),
            uuid_egress: Uuid::new_v4(),
            source_vn,
            dest_vn,
            vm: None,
        }
    }
}
