//! §8 scenario 6: "start walk on table T; concurrently enqueue 100 DELETEs;
//! cancel walk; done_fn fires exactly once; all DELETEs observed by
//! listeners."

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use vra_db::{NotifyKind, Oper};
use vra_walker::{WalkControl, Walker};

use super::{new_table, wait_until};

#[tokio::test]
async fn cancelled_walk_fires_done_once_and_deletes_still_land() {
    let table = new_table();

    for k in 0..200u32 {
        table.enqueue(k, Oper::AddOrUpdate(k)).expect("enqueue seed entry");
    }
    wait_until(|| table.len() == 200).await;

    let deletes_seen = Arc::new(AtomicUsize::new(0));
    let deletes_seen_for_listener = Arc::clone(&deletes_seen);
    table.register_listener(Arc::new(move |kind: NotifyKind, _: &_| {
        if kind == NotifyKind::Delete {
            deletes_seen_for_listener.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let walker = Walker::new(table.clone());
    let visited = Arc::new(AtomicUsize::new(0));
    let done_calls = Arc::new(AtomicUsize::new(0));
    let cancelled_flag = Arc::new(AtomicBool::new(false));

    let visited_for_walk = Arc::clone(&visited);
    let done_calls_for_done = Arc::clone(&done_calls);
    let cancelled_for_done = Arc::clone(&cancelled_flag);
    let walk_id = walker.walk(
        move |_shard, _entry| {
            visited_for_walk.fetch_add(1, Ordering::SeqCst);
            WalkControl::Continue
        },
        move |_id, cancelled| {
            done_calls_for_done.fetch_add(1, Ordering::SeqCst);
            cancelled_for_done.store(cancelled, Ordering::SeqCst);
        },
    );

    // Concurrently tear down 100 of the seeded entries while the walk is
    // (or may still be) in flight.
    for k in 0..100u32 {
        table.enqueue(k, Oper::Delete).expect("enqueue delete");
    }
    walker.cancel(walk_id);

    wait_until(|| done_calls.load(Ordering::SeqCst) == 1).await;
    wait_until(|| deletes_seen.load(Ordering::SeqCst) == 100).await;

    assert_eq!(done_calls.load(Ordering::SeqCst), 1, "done_fn must fire exactly once");
    assert_eq!(deletes_seen.load(Ordering::SeqCst), 100, "every delete is still observed by the listener");
    assert!(!walker.is_active(walk_id), "walk is no longer tracked once done_fn has fired");
}
