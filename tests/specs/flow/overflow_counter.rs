//! §8 scenario 5: the kernel's 32-bit byte counter wraps past `2^32` while
//! the flow's stored 64-bit counter has already banked a `2^48` carry; the
//! aging loop must reconcile the two into the correct monotonic total rather
//! than either regressing or double-carrying.

use std::net::Ipv4Addr;

use vra_db::Oper;
use vra_flow::{AgingConfig, FlowEntry, FlowFlags, FlowKey, KernelFlowRecord};

use super::{new_fixture, wait_until};

#[tokio::test]
async fn kernel_byte_counter_wraparound_is_reconciled_into_stored_total() {
    let fixture = new_fixture(AgingConfig { age_time_ms: 10_000_000, multiplier: 1000, default_interval_ms: 1000 });

    let flow_key = FlowKey::new(Ipv4Addr::new(172, 16, 0, 1), Ipv4Addr::new(172, 16, 0, 2), 6, 4000, 22);
    let mut entry = FlowEntry::new(99, 0, "vn-a".to_string(), "vn-b".to_string());
    entry.flags = FlowFlags { ingress: true, local: false, nat: false, short_flow: false };
    // Already carrying one 2^48 wrap in the high bits, with a low-32 value
    // of 0xffff_ff00 stored from the previous pass.
    entry.bytes = 0x0000_ffff_ffff_ff00;
    entry.packets = 0;

    fixture.table.enqueue(flow_key, Oper::AddOrUpdate(entry)).expect("enqueue");
    wait_until(|| fixture.table.len() == 1).await;

    // The kernel's raw 32-bit counter has wrapped past zero to 0x10, with no
    // overflow word bumped yet (the kernel hasn't caught up to the carry the
    // aging loop already knows about).
    fixture.kernel.set(99, KernelFlowRecord { bytes: 0x10, packets: 1, bytes_oflow: 0, packets_oflow: 0 });

    let report = fixture.ager.run_pass();
    assert_eq!(report.deleted, 0);

    let records = fixture.export.take();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.bytes, Some(0x0001_0000_0000_0010), "carry bit folded in, low bits taken from the kernel reading");
    assert_eq!(record.diff_bytes, Some(0x0001_0000_0000_0010 - 0x0000_ffff_ffff_ff00));
    assert_eq!(record.packets, Some(1));
    assert_eq!(record.diff_packets, Some(1));

    let stored = fixture.table.find(&flow_key, false).expect("flow still present");
    assert_eq!(stored.with_payload(|f| f.bytes), 0x0001_0000_0000_0010, "reconciled total is written back in place");
}

#[tokio::test]
async fn kernel_slot_reuse_is_not_mistaken_for_wraparound() {
    let fixture = new_fixture(AgingConfig { age_time_ms: 10_000_000, multiplier: 1000, default_interval_ms: 1000 });

    let flow_key = FlowKey::new(Ipv4Addr::new(172, 16, 0, 1), Ipv4Addr::new(172, 16, 0, 2), 6, 4001, 22);
    let mut entry = FlowEntry::new(100, 0, "vn-a".to_string(), "vn-b".to_string());
    entry.flags = FlowFlags { ingress: true, local: false, nat: false, short_flow: false };
    entry.bytes = 5_000_000;
    entry.packets = 5_000;

    fixture.table.enqueue(flow_key, Oper::AddOrUpdate(entry)).expect("enqueue");
    wait_until(|| fixture.table.len() == 1).await;

    // A brand new, much smaller flow now occupies kernel slot 100: its raw
    // counters read far below what we've already banked, with no held high
    // bits to explain it away as a wrap.
    fixture.kernel.set(100, KernelFlowRecord { bytes: 40, packets: 1, bytes_oflow: 0, packets_oflow: 0 });

    fixture.ager.run_pass();

    let records = fixture.export.take();
    assert!(records.is_empty(), "a reused slot is not reconciled or exported this pass");

    let stored = fixture.table.find(&flow_key, false).expect("flow still present");
    assert_eq!(stored.with_payload(|f| f.bytes), 5_000_000, "stored counters are left untouched when the slot looks reused");
}
