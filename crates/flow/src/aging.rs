// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The flow aging and export loop (§4.5) — the most intricate consumer of
//! the scheduler/table/walker contracts, built as a timer-driven pass over
//! an ordinary [`FlowTable`] rather than a fourth parallel mechanism.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;
use vra_core::Clock;
use vra_db::{Entry, Oper};

use crate::export::{FlowDataIpv4, FlowExportSink};
use crate::hooks::FlowTable;
use crate::kernel::{KernelFlowRecord, KernelFlowTable};
use crate::stats::InterVnStatsSink;
use crate::types::{FlowEntry, FlowFlags, FlowKey};

/// Tuning knobs for the aging/export loop (§4.5, §8 boundary behaviors).
#[derive(Debug, Clone, Copy)]
pub struct AgingConfig {
    /// How long a flow may go unmodified before it is aging-eligible.
    pub age_time_ms: u64,
    /// Scales the adaptive pacing interval; see `recompute_pacing`.
    pub multiplier: u64,
    /// `flow_timer_interval` used while the table is empty.
    pub default_interval_ms: u64,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self { age_time_ms: 180_000, multiplier: 1000, default_interval_ms: 1000 }
    }
}

/// Outcome of a single aging pass, for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub visited: usize,
    pub deleted: usize,
}

/// Composes `kernel_bytes = (oflow_bytes << 32) | bytes` (§4.5 step 4).
fn compose_kernel_bytes(record: &KernelFlowRecord) -> u64 {
    ((record.bytes_oflow as u64) << 32) | record.bytes as u64
}

/// Composes `kernel_pkts = (oflow_pkts << 40) | pkts` (§4.5 step 4).
fn compose_kernel_packets(record: &KernelFlowRecord) -> u64 {
    ((record.packets_oflow as u64) << 40) | record.packets as u64
}

/// A regression this large in the raw 32-bit counter can't be explained by
/// the counter having simply wrapped once: a genuine wrap leaves the new
/// reading close to zero and the old reading close to `u32::MAX`, so the
/// *regression* (old − new) sits close to `1 << 32`. Anything regressing by
/// less than half that span is a different, much smaller flow occupying a
/// reused slot, not our own counter wrapping (§4.5 step 2, §8 scenario 5).
const WRAP_REGRESSION_FLOOR: u64 = 1u64 << 31;

/// One raw 32-bit field regressed (`new < old`): is it a genuine wrap of our
/// own flow's counter, or has the kernel slot been reused by a different,
/// unrelated flow? A wrap regresses by nearly the full `2^32` span; a reused
/// slot regresses by whatever the old flow had banked, which is typically
/// far short of that.
fn field_regressed_via_reuse(stored_low32: u32, kernel_value: u32) -> bool {
    if kernel_value >= stored_low32 {
        return false;
    }
    let regression = (stored_low32 - kernel_value) as u64;
    regression < WRAP_REGRESSION_FLOOR
}

/// The kernel slot has been reused by a different flow: at least one raw
/// counter regressed by more than a single wrap can explain (§4.5 step 2).
fn kernel_slot_reused(stored_bytes: u64, stored_packets: u64, record: &KernelFlowRecord) -> bool {
    let stored_bytes_low32 = (stored_bytes & 0xFFFF_FFFF) as u32;
    let stored_packets_low32 = (stored_packets & 0xFFFF_FFFF) as u32;
    field_regressed_via_reuse(stored_bytes_low32, record.bytes)
        || field_regressed_via_reuse(stored_packets_low32, record.packets)
}

/// Reconciles a monotonic 64-bit counter against a kernel reading that may
/// have wrapped (§4.5 step 4, §8 "overflow counter").
///
/// `shift` is the bit position splitting the "held" high bits (the part we
/// keep carrying forward) from the low bits the kernel composition can
/// supply directly: 48 for bytes, 40 for packets.
fn reconcile_counter(stored: u64, kernel_composed: u64, shift: u32) -> u64 {
    let mask = (1u64 << shift) - 1;
    let stored_low = stored & mask;
    let mut held_high = stored & !mask;
    if stored_low > kernel_composed {
        held_high = held_high.wrapping_add(1u64 << shift);
    }
    held_high | kernel_composed
}

/// NAT source-IP override for an exported ingress record (§4.5, §8 scenario
/// 4): only applies when the flow is NAT-ed and the reverse flow's
/// destination IP differs from this flow's source IP.
fn nat_override_source_ip(nat: bool, flow_src_ip: Ipv4Addr, reverse_dst_ip: Option<Ipv4Addr>) -> Option<Ipv4Addr> {
    if !nat {
        return None;
    }
    match reverse_dst_ip {
        Some(ip) if ip != flow_src_ip => Some(ip),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    key: FlowKey,
    direction_ing: u8,
    uuid: Uuid,
    reverse_uuid: Option<Uuid>,
    source_vn: &str,
    dest_vn: &str,
    vm: Option<String>,
    cumulative_bytes: u64,
    cumulative_packets: u64,
    diff_bytes: u64,
    diff_packets: u64,
    setup_time_ms: u64,
    teardown_time_ms: Option<u64>,
    nat_override_ip: Option<Ipv4Addr>,
) -> FlowDataIpv4 {
    let sourceip = if direction_ing == 1 { nat_override_ip.or(Some(key.src_ip)) } else { Some(key.src_ip) };
    FlowDataIpv4 {
        flowuuid: uuid,
        sourceip,
        destip: Some(key.dst_ip),
        protocol: Some(key.proto),
        sport: Some(key.src_port),
        dport: Some(key.dst_port),
        sourcevn: Some(source_vn.to_string()),
        destvn: Some(dest_vn.to_string()),
        vm,
        bytes: Some(cumulative_bytes),
        packets: Some(cumulative_packets),
        diff_bytes: Some(diff_bytes),
        diff_packets: Some(diff_packets),
        reverse_uuid,
        setup_time: Some(setup_time_ms),
        teardown_time: teardown_time_ms,
        direction_ing,
    }
}

/// Whether a flow (identified by its already-looked-up entry) is itself
/// aging-eligible right now — used both for the primary flow and, for
/// paired aging, for its reverse partner (§4.5 step 3: "both must be
/// aging-eligible").
fn entry_should_age(
    entry: &Arc<Entry<FlowKey, FlowEntry>>,
    now_ms: u64,
    kernel: &dyn KernelFlowTable,
    age_time_ms: u64,
) -> bool {
    let (handle, last_modified, bytes, packets) =
        entry.with_payload(|f| (f.flow_handle, f.last_modified_time_ms, f.bytes, f.packets));
    let slot_reused =
        kernel.read(handle).map(|r| kernel_slot_reused(bytes, packets, &r)).unwrap_or(false);
    !slot_reused && now_ms.saturating_sub(last_modified) >= age_time_ms
}

/// Drives the periodic aging/export pass over a [`FlowTable`] (§4.5).
pub struct FlowAger<C: Clock> {
    table: FlowTable,
    kernel: Arc<dyn KernelFlowTable>,
    export: Arc<dyn FlowExportSink>,
    stats: Arc<dyn InterVnStatsSink>,
    clock: C,
    config: AgingConfig,
    last_visited: Mutex<Option<FlowKey>>,
    flow_timer_interval_ms: AtomicU64,
    flow_count_per_pass: AtomicUsize,
}

impl<C: Clock> FlowAger<C> {
    pub fn new(
        table: FlowTable,
        kernel: Arc<dyn KernelFlowTable>,
        export: Arc<dyn FlowExportSink>,
        stats: Arc<dyn InterVnStatsSink>,
        clock: C,
        config: AgingConfig,
    ) -> Self {
        Self {
            table,
            kernel,
            export,
            stats,
            clock,
            config,
            last_visited: Mutex::new(None),
            flow_timer_interval_ms: AtomicU64::new(config.default_interval_ms),
            flow_count_per_pass: AtomicUsize::new(100),
        }
    }

    pub fn flow_timer_interval_ms(&self) -> u64 {
        self.flow_timer_interval_ms.load(Ordering::Relaxed)
    }

    pub fn flow_count_per_pass(&self) -> usize {
        self.flow_count_per_pass.load(Ordering::Relaxed)
    }

    /// Runs one aging pass: up to `flow_count_per_pass` entries starting
    /// from the successor of the last-visited key, wrapping at the end
    /// (§4.5 "Timer"). Synchronous and bounded, matching §5's "a task must
    /// complete a bounded unit before returning".
    pub fn run_pass(&self) -> PassReport {
        let now = self.clock.epoch_ms();
        let snapshot = self.table.snapshot_all();
        let total = snapshot.len();
        if total == 0 {
            self.recompute_pacing(0);
            return PassReport::default();
        }

        let start = match *self.last_visited.lock() {
            Some(ref last) => snapshot.iter().position(|e| e.key() > last).unwrap_or(0),
            None => 0,
        };

        let per_pass = self.flow_count_per_pass.load(Ordering::Relaxed);
        let mut report = PassReport::default();
        let mut processed: HashSet<FlowKey> = HashSet::new();
        let mut last_key_seen = None;
        let mut cursor = start;

        while report.visited < per_pass && processed.len() < total {
            let entry = &snapshot[cursor % total];
            cursor += 1;
            let key = *entry.key();

            if entry.is_deleted() || processed.contains(&key) {
                continue;
            }
            processed.insert(key);
            last_key_seen = Some(key);
            report.visited += 1;

            if self.process_entry(entry, now, &mut processed) {
                report.deleted += 1;
            }
        }

        if let Some(key) = last_key_seen {
            *self.last_visited.lock() = Some(key);
        }
        self.recompute_pacing(total);
        report
    }

    /// The full per-entry algorithm of §4.5 steps 2-5. Returns whether this
    /// flow (and possibly its paired partner) was deleted this pass.
    fn process_entry(
        &self,
        entry: &Arc<Entry<FlowKey, FlowEntry>>,
        now: u64,
        processed: &mut HashSet<FlowKey>,
    ) -> bool {
        let key = *entry.key();
        let snap = entry.with_payload(|f| {
            (
                f.bytes,
                f.packets,
                f.last_modified_time_ms,
                f.setup_time_ms,
                f.reverse_flow,
                f.flags,
                f.flow_handle,
                f.uuid_primary,
                f.uuid_egress,
                f.source_vn.clone(),
                f.dest_vn.clone(),
                f.vm.clone(),
            )
        });
        let (stored_bytes, stored_packets, last_modified, setup_time, reverse_key, flags, handle, uuid_primary, uuid_egress, source_vn, dest_vn, vm) = snap;

        let kernel_record = self.kernel.read(handle);
        let slot_reused =
            kernel_record.map(|r| kernel_slot_reused(stored_bytes, stored_packets, &r)).unwrap_or(false);
        let should_age = !slot_reused && now.saturating_sub(last_modified) >= self.config.age_time_ms;

        let reverse_entry = reverse_key.and_then(|rk| self.table.find(&rk, false));

        // Stats reconciliation + export (§4.5 step 4), before any deletion
        // decision: this is the final, authoritative snapshot whether or
        // not the flow is about to be torn down.
        let (cumulative_bytes, cumulative_packets, diff_bytes, diff_packets) =
            if let Some(record) = kernel_record.filter(|_| !slot_reused) {
                let new_bytes = reconcile_counter(stored_bytes, compose_kernel_bytes(&record), 48);
                let new_packets = reconcile_counter(stored_packets, compose_kernel_packets(&record), 40);
                let diff_bytes = new_bytes.saturating_sub(stored_bytes);
                let diff_packets = new_packets.saturating_sub(stored_packets);
                self.stats.record(&source_vn, &dest_vn, diff_bytes, diff_packets);
                entry.update_payload(|f| {
                    f.bytes = new_bytes;
                    f.packets = new_packets;
                    f.last_modified_time_ms = now;
                });
                (new_bytes, new_packets, diff_bytes, diff_packets)
            } else {
                (stored_bytes, stored_packets, 0, 0)
            };

        if kernel_record.is_some() && !slot_reused {
            self.emit(
                key,
                flags,
                uuid_primary,
                uuid_egress,
                &source_vn,
                &dest_vn,
                vm,
                cumulative_bytes,
                cumulative_packets,
                diff_bytes,
                diff_packets,
                setup_time,
                None,
                reverse_entry.as_ref(),
            );
        }

        // Paired aging (§4.5 step 3): both sides must be aging-eligible.
        let partner_ready = if !should_age {
            false
        } else if let Some(reverse) = &reverse_entry {
            entry_should_age(reverse, now, self.kernel.as_ref(), self.config.age_time_ms)
        } else {
            reverse_key.is_none()
        };

        if should_age && partner_ready {
            entry.update_payload(|f| f.teardown_time_ms = Some(now));
            let _ = self.table.enqueue(key, Oper::Delete);
            if let Some(reverse) = &reverse_entry {
                let rk = *reverse.key();
                reverse.update_payload(|f| f.teardown_time_ms = Some(now));
                let _ = self.table.enqueue(rk, Oper::Delete);
                processed.insert(rk);
            }
            return true;
        }

        if flags.short_flow {
            entry.update_payload(|f| f.teardown_time_ms = Some(now));
            let _ = self.table.enqueue(key, Oper::Delete);
            return true;
        }

        false
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        key: FlowKey,
        flags: FlowFlags,
        uuid_primary: Uuid,
        uuid_egress: Uuid,
        source_vn: &str,
        dest_vn: &str,
        vm: Option<String>,
        cumulative_bytes: u64,
        cumulative_packets: u64,
        diff_bytes: u64,
        diff_packets: u64,
        setup_time: u64,
        teardown_time: Option<u64>,
        reverse_entry: Option<&Arc<Entry<FlowKey, FlowEntry>>>,
    ) {
        let reverse_uuid = reverse_entry.map(|r| r.with_payload(|f| f.uuid_primary));
        let reverse_dst_ip = reverse_entry.map(|r| r.key().dst_ip);

        if flags.local {
            let nat_ip = nat_override_source_ip(flags.nat, key.src_ip, reverse_dst_ip);
            self.export.export(build_record(
                key, 1, uuid_primary, reverse_uuid, source_vn, dest_vn, vm.clone(),
                cumulative_bytes, cumulative_packets, diff_bytes, diff_packets,
                setup_time, teardown_time, nat_ip,
            ));
            self.export.export(build_record(
                key, 0, uuid_egress, reverse_uuid, source_vn, dest_vn, vm,
                cumulative_bytes, cumulative_packets, diff_bytes, diff_packets,
                setup_time, teardown_time, None,
            ));
        } else if diff_bytes > 0 || diff_packets > 0 {
            let direction_ing = if flags.ingress { 1 } else { 0 };
            let nat_ip = nat_override_source_ip(flags.nat, key.src_ip, reverse_dst_ip);
            self.export.export(build_record(
                key, direction_ing, uuid_primary, reverse_uuid, source_vn, dest_vn, vm,
                cumulative_bytes, cumulative_packets, diff_bytes, diff_packets,
                setup_time, teardown_time, nat_ip,
            ));
        }
    }

    /// Recomputes `flow_timer_interval`/`flow_count_per_pass` so every flow
    /// is visited roughly once per `age_time` regardless of table size
    /// (§4.5 "Adaptive pacing", §8 boundary behaviors).
    fn recompute_pacing(&self, total_flows: usize) {
        let age_ms = self.config.age_time_ms.max(1);
        let interval_ms = if total_flows == 0 {
            self.config.default_interval_ms
        } else {
            std::cmp::min((age_ms * self.config.multiplier) / total_flows as u64, 1000)
        };
        self.flow_timer_interval_ms.store(interval_ms, Ordering::Relaxed);

        let count_per_pass = std::cmp::max((interval_ms * total_flows as u64) / age_ms, 100);
        self.flow_count_per_pass.store(count_per_pass as usize, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "aging_tests.rs"]
mod tests;
