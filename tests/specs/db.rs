//! §8 scenarios 1-2: table ADD/LOOKUP and listener-held DELETE.

mod add_then_lookup;
mod delete_held_by_listener;

use std::num::NonZeroUsize;
use std::time::Duration;

use vra_db::{Table, TableConfig, TableHooks};
use vra_scheduler::TaskScheduler;

#[derive(Clone, Default)]
pub(crate) struct NoopHooks;
impl TableHooks<String, u32> for NoopHooks {}

pub(crate) fn small_config() -> TableConfig {
    TableConfig {
        shards: NonZeroUsize::new(4).expect("4 is nonzero"),
        batch_size: 8,
        high_water_mark: 64,
        delete_timeout: Duration::from_millis(100),
        fatal_on_delete_timeout: false,
        retirement_interval: Duration::from_millis(10),
    }
}

pub(crate) fn new_table() -> Table<String, u32, NoopHooks> {
    let scheduler = TaskScheduler::new();
    let class = scheduler.register_class("db::DBTable", &[]).expect("register class");
    Table::new("vrf", scheduler, class, NoopHooks, small_config())
}

pub(crate) async fn wait_until(mut pred: impl FnMut() -> bool) {
    for _ in 0..400 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}
