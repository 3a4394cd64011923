//! §8 scenario 4: a NAT-ed ingress flow exports with its reverse flow's
//! destination IP as `sourceip` instead of its own, but only because the two
//! differ; a non-NAT flow, or one whose reverse destination IP matches, gets
//! no override.

use std::net::Ipv4Addr;

use vra_db::Oper;
use vra_flow::{AgingConfig, FlowEntry, FlowFlags, FlowKey};

use super::{new_fixture, wait_until};

fn key(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16) -> FlowKey {
    FlowKey::new(src, dst, 6, src_port, dst_port)
}

#[tokio::test]
async fn nat_flow_exports_reverse_destination_ip_as_source() {
    let fixture = new_fixture(AgingConfig { age_time_ms: 10_000_000, multiplier: 1000, default_interval_ms: 1000 });

    // §8 scenario 4's own numbers: ingress flow A with key.src=10.0.0.1,
    // reverse B with key.dst=192.168.1.1 (differs from A's source).
    let forward_key = key(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(203, 0, 113, 9), 5555, 443);
    let reverse_key = key(Ipv4Addr::new(203, 0, 113, 9), Ipv4Addr::new(192, 168, 1, 1), 443, 5555);

    let mut forward = FlowEntry::new(10, 0, "vn-client".to_string(), "vn-server".to_string());
    forward.flags = FlowFlags { ingress: true, local: false, nat: true, short_flow: false };
    forward.reverse_flow = Some(reverse_key);

    let mut reverse = FlowEntry::new(11, 0, "vn-server".to_string(), "vn-client".to_string());
    reverse.flags = FlowFlags { ingress: false, local: false, nat: false, short_flow: false };
    reverse.reverse_flow = Some(forward_key);

    fixture.table.enqueue(forward_key, Oper::AddOrUpdate(forward)).expect("enqueue forward");
    fixture.table.enqueue(reverse_key, Oper::AddOrUpdate(reverse)).expect("enqueue reverse");
    wait_until(|| fixture.table.len() == 2).await;

    fixture.kernel.set(10, vra_flow::KernelFlowRecord { bytes: 2000, packets: 20, bytes_oflow: 0, packets_oflow: 0 });

    let report = fixture.ager.run_pass();
    assert_eq!(report.deleted, 0, "neither flow is aging-eligible yet");

    let records = fixture.export.take();
    assert_eq!(records.len(), 1, "only the forward (non-local) flow has kernel activity to export");
    let record = &records[0];
    assert_eq!(record.direction_ing, 1);
    assert_eq!(record.sourceip, Some(Ipv4Addr::new(192, 168, 1, 1)), "sourceip is overridden to the reverse flow's destination IP");
}

#[tokio::test]
async fn nat_override_is_skipped_when_reverse_destination_matches_source() {
    let fixture = new_fixture(AgingConfig { age_time_ms: 10_000_000, multiplier: 1000, default_interval_ms: 1000 });

    let forward_key = key(Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(203, 0, 113, 9), 5555, 443);
    // Reverse destination equals the forward flow's own source IP: no real
    // translation happened downstream, so no override should apply.
    let reverse_key = key(Ipv4Addr::new(203, 0, 113, 9), Ipv4Addr::new(192, 168, 1, 5), 443, 5555);

    let mut forward = FlowEntry::new(20, 0, "vn-client".to_string(), "vn-server".to_string());
    forward.flags = FlowFlags { ingress: true, local: false, nat: true, short_flow: false };
    forward.reverse_flow = Some(reverse_key);

    let mut reverse = FlowEntry::new(21, 0, "vn-server".to_string(), "vn-client".to_string());
    reverse.flags = FlowFlags { ingress: false, local: false, nat: false, short_flow: false };
    reverse.reverse_flow = Some(forward_key);

    fixture.table.enqueue(forward_key, Oper::AddOrUpdate(forward)).expect("enqueue forward");
    fixture.table.enqueue(reverse_key, Oper::AddOrUpdate(reverse)).expect("enqueue reverse");
    wait_until(|| fixture.table.len() == 2).await;

    fixture.kernel.set(20, vra_flow::KernelFlowRecord { bytes: 500, packets: 5, bytes_oflow: 0, packets_oflow: 0 });

    fixture.ager.run_pass();

    let records = fixture.export.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sourceip, Some(Ipv4Addr::new(192, 168, 1, 5)), "no override: reverse destination already matches this flow's source");
}
