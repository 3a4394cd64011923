//! §8 scenario 6: a walk cancelled mid-flight still fires `done_fn` exactly
//! once, and concurrent deletes against the same table are unaffected by
//! the walk.

mod cancel_during_mutation;

use std::num::NonZeroUsize;
use std::time::Duration;

use vra_db::{Table, TableConfig, TableHooks};
use vra_scheduler::TaskScheduler;

#[derive(Clone, Default)]
pub(crate) struct NoopHooks;
impl TableHooks<u32, u32> for NoopHooks {}

pub(crate) fn small_config() -> TableConfig {
    TableConfig {
        shards: NonZeroUsize::new(4).expect("4 is nonzero"),
        batch_size: 16,
        high_water_mark: 512,
        delete_timeout: Duration::from_secs(5),
        fatal_on_delete_timeout: false,
        retirement_interval: Duration::from_millis(10),
    }
}

pub(crate) fn new_table() -> Table<u32, u32, NoopHooks> {
    let scheduler = TaskScheduler::new();
    let class = scheduler.register_class("db::DBTable", &[]).expect("register class");
    Table::new("walked", scheduler, class, NoopHooks, small_config())
}

pub(crate) async fn wait_until(mut pred: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition never became true");
}
