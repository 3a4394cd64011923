//! §8 scenarios 3-5: paired flow aging, NAT source override, and kernel
//! counter overflow, driven end-to-end through `vra_flow::FlowAger` against
//! a real `vra_db::Table` and a `MockKernelFlowTable`.

mod nat_source_override;
mod overflow_counter;
mod paired_flow_aging;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use vra_core::FakeClock;
use vra_db::TableConfig;
use vra_flow::{
    AgingConfig, CountingInterVnStatsSink, FlowAger, FlowHooks, FlowTable, MockKernelFlowTable,
    RecordingExportSink,
};
use vra_scheduler::TaskScheduler;

pub(crate) fn small_config() -> TableConfig {
    TableConfig {
        shards: NonZeroUsize::new(4).expect("4 is nonzero"),
        batch_size: 8,
        high_water_mark: 256,
        delete_timeout: Duration::from_secs(30),
        fatal_on_delete_timeout: false,
        retirement_interval: Duration::from_millis(20),
    }
}

pub(crate) fn new_table() -> FlowTable {
    let scheduler = TaskScheduler::new();
    let class = scheduler.register_class("db::DBTable", &[]).expect("register class");
    vra_db::Table::new("flow", scheduler, class, FlowHooks, small_config())
}

pub(crate) struct Fixture {
    pub ager: FlowAger<FakeClock>,
    pub table: FlowTable,
    pub kernel: Arc<MockKernelFlowTable>,
    pub export: Arc<RecordingExportSink>,
    pub stats: Arc<CountingInterVnStatsSink>,
    pub clock: FakeClock,
}

pub(crate) fn new_fixture(config: AgingConfig) -> Fixture {
    let table = new_table();
    let kernel = Arc::new(MockKernelFlowTable::new());
    let export = Arc::new(RecordingExportSink::new());
    let stats = Arc::new(CountingInterVnStatsSink::new());
    let clock = FakeClock::new();
    let ager = FlowAger::new(
        table.clone(),
        Arc::clone(&kernel) as Arc<dyn vra_flow::KernelFlowTable>,
        Arc::clone(&export) as Arc<dyn vra_flow::FlowExportSink>,
        Arc::clone(&stats) as Arc<dyn vra_flow::InterVnStatsSink>,
        clock.clone(),
        config,
    );
    Fixture { ager, table, kernel, export, stats, clock }
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
