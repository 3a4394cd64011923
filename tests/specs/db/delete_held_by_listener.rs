//! §8 scenario 2: a listener that attaches DBState and holds a reference
//! keeps the deleted entry findable (with `include_deleted=true`) until it
//! releases, at which point `Destroy` runs and the key disappears.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vra_db::{ListenerId, NotifyKind, Oper, TableListener};

use super::{new_table, wait_until};

struct HoldingListener {
    id: ListenerId,
    deletes_seen: AtomicUsize,
}

impl TableListener<String, u32> for HoldingListener {
    fn notify(&self, kind: NotifyKind, entry: &Arc<vra_db::Entry<String, u32>>) {
        if kind == NotifyKind::Delete {
            entry.acquire();
            entry.set_state(self.id, Box::new(()));
            self.deletes_seen.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn listener_hold_delays_destroy_until_release() {
    let table = new_table();
    table.enqueue("vrf-a".to_string(), Oper::AddOrUpdate(1)).expect("enqueue");
    wait_until(|| table.find(&"vrf-a".to_string(), false).is_some()).await;

    let listener = Arc::new(HoldingListener { id: ListenerId::new(), deletes_seen: AtomicUsize::new(0) });
    table.register_listener(listener.clone());

    table.enqueue("vrf-a".to_string(), Oper::Delete).expect("enqueue delete");
    wait_until(|| listener.deletes_seen.load(Ordering::SeqCst) == 1).await;

    // Deleted but still held: findable with include_deleted, invisible
    // otherwise, and not yet destroyed regardless of how long we wait.
    assert!(table.find(&"vrf-a".to_string(), false).is_none());
    let held = table.find(&"vrf-a".to_string(), true).expect("deleted entry still findable while held");
    assert!(held.is_deleted());
    assert_eq!(held.holder_count(), 1);
    assert!(held.has_state(listener.id));

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    assert!(table.find(&"vrf-a".to_string(), true).is_some(), "still held, so not yet destroyed");

    held.clear_state(listener.id);
    held.release();
    wait_until(|| table.find(&"vrf-a".to_string(), true).is_none()).await;
}
