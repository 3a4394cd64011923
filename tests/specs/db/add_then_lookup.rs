//! §8 scenario 1: `Enqueue(ADD k); drain; Find(k)` returns an entry with an
//! id assigned from a monotonic id allocator.

use vra_db::Oper;

use super::{new_table, wait_until};

#[tokio::test]
async fn add_then_lookup_assigns_a_monotonic_entry_id() {
    let table = new_table();

    table.enqueue("vrf-a".to_string(), Oper::AddOrUpdate(1)).expect("enqueue vrf-a");
    wait_until(|| table.find(&"vrf-a".to_string(), false).is_some()).await;

    let entry = table.find(&"vrf-a".to_string(), false).expect("vrf-a present");
    assert_eq!(entry.snapshot(), 1);
    assert_eq!(entry.id(), 1);

    table.enqueue("vrf-b".to_string(), Oper::AddOrUpdate(2)).expect("enqueue vrf-b");
    wait_until(|| table.find(&"vrf-b".to_string(), false).is_some()).await;
    let second = table.find(&"vrf-b".to_string(), false).expect("vrf-b present");
    assert_eq!(second.id(), 2, "ids are assigned from a single monotonic counter, not per-shard");
}

#[tokio::test]
async fn update_of_an_existing_key_keeps_its_original_id() {
    let table = new_table();
    table.enqueue("vrf-a".to_string(), Oper::AddOrUpdate(1)).expect("enqueue");
    wait_until(|| table.find(&"vrf-a".to_string(), false).is_some()).await;
    let original_id = table.find(&"vrf-a".to_string(), false).expect("present").id();

    table.enqueue("vrf-a".to_string(), Oper::AddOrUpdate(99)).expect("enqueue update");
    wait_until(|| table.find(&"vrf-a".to_string(), false).map(|e| e.snapshot()) == Some(99)).await;

    let entry = table.find(&"vrf-a".to_string(), false).expect("present");
    assert_eq!(entry.id(), original_id);
    assert_eq!(entry.snapshot(), 99);
}
