//! §8 scenario 3: a local ingress flow and its non-local egress partner age
//! out together once both sides cross `age_time_ms`, with a single
//! `PassReport::deleted` accounting for the pair.

use std::net::Ipv4Addr;
use std::time::Duration;

use vra_db::Oper;
use vra_flow::{AgingConfig, FlowEntry, FlowFlags, FlowKey};

use super::{new_fixture, wait_until};

fn key(src_port: u16, dst_port: u16) -> FlowKey {
    FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 6, src_port, dst_port)
}

#[tokio::test]
async fn paired_flows_age_out_together_in_one_pass() {
    let age_time_ms = 60_000;
    let fixture = new_fixture(AgingConfig { age_time_ms, multiplier: 1000, default_interval_ms: 1000 });
    fixture.clock.set_epoch_ms(0);

    let forward_key = key(1111, 80);
    let reverse_key = key(80, 1111);

    let mut forward = FlowEntry::new(1, 0, "vn-a".to_string(), "vn-b".to_string());
    forward.flags = FlowFlags { ingress: true, local: true, nat: false, short_flow: false };
    forward.reverse_flow = Some(reverse_key);

    let mut reverse = FlowEntry::new(2, 0, "vn-b".to_string(), "vn-a".to_string());
    reverse.flags = FlowFlags { ingress: false, local: false, nat: false, short_flow: false };
    reverse.reverse_flow = Some(forward_key);

    fixture.table.enqueue(forward_key, Oper::AddOrUpdate(forward)).expect("enqueue forward");
    fixture.table.enqueue(reverse_key, Oper::AddOrUpdate(reverse)).expect("enqueue reverse");
    wait_until(|| fixture.table.len() == 2).await;

    fixture.clock.advance(Duration::from_millis(age_time_ms * 2));

    let report = fixture.ager.run_pass();

    assert_eq!(report.visited, 1, "the reverse partner is retired inside the forward flow's call, not visited separately");
    assert_eq!(report.deleted, 1, "deleted counts process_entry calls that triggered a deletion, not rows removed");

    wait_until(|| fixture.table.is_empty()).await;
    assert!(fixture.table.find(&forward_key, false).is_none());
    assert!(fixture.table.find(&reverse_key, false).is_none());
}
