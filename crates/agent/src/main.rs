// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vrouter-agentd` — bootstraps the scheduler, the tables it owns, and the
//! flow aging loop, then blocks until asked to shut down (§2).

use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use vra_config::{AgentConfig, CliOverrides};
use vra_core::{AgentError, SystemClock};
use vra_db::TableConfig;
use vra_flow::{
    AgingConfig, FlowAger, FlowHooks, FlowTable, NullInterVnStatsSink, NullKernelFlowTable,
    RecordingExportSink,
};
use vra_scheduler::{class_names, InstanceKey, TaskScheduler};

fn install_tracing(config: &AgentConfig) {
    let filter = if config.log_local {
        tracing_subscriber::EnvFilter::new(format!("{}={}", config.log_category, config.log_level))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: AgentConfig) -> Result<(), AgentError> {
    install_tracing(&config);
    info!(host = %config.host_name, "vrouter-agentd starting");

    // The whole bootstrap from step 3 onward submits work to the scheduler
    // (table construction spins up its lifetime manager's retirement task;
    // the aging loop enqueues its first pass), and `TaskScheduler::drive`
    // calls `tokio::spawn` as soon as anything is runnable. None of that may
    // happen before a runtime exists, so the runtime is created first and
    // everything else — including the final shutdown wait — runs inside it.
    let rt = tokio::runtime::Runtime::new()
        .map_err(|err| AgentError::invariant(format!("failed to start tokio runtime: {err}")))?;
    let _guard = rt.enter();

    let scheduler = TaskScheduler::new();
    scheduler.install_default_policy()?;

    let db_class = scheduler
        .class_id(class_names::DB_TABLE)
        .ok_or_else(|| AgentError::invariant("db::DBTable class missing after default policy install"))?;
    let flow_class = scheduler
        .class_id(class_names::FLOW_HANDLER)
        .ok_or_else(|| AgentError::invariant("FlowHandler class missing after default policy install"))?;

    // Step 5: tables depend on the scheduler + its own lifetime manager,
    // constructed internally by `Table::new`.
    let flow_table: FlowTable =
        vra_db::Table::new("flow", Arc::clone(&scheduler), db_class, FlowHooks, TableConfig {
            shards: NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN),
            ..TableConfig::default()
        });

    // Step 6: the real netlink/RPC transports are out of scope (§1); wire the
    // provided mock/null adapters instead.
    let ager: Arc<FlowAger<SystemClock>> = Arc::new(FlowAger::new(
        flow_table,
        Arc::new(NullKernelFlowTable),
        Arc::new(RecordingExportSink::new()),
        Arc::new(NullInterVnStatsSink),
        SystemClock,
        AgingConfig::default(),
    ));
    spawn_aging_loop(Arc::clone(&scheduler), flow_class, ager);

    info!("vrouter-agentd ready");

    // Step 7: hand control to the scheduler until asked to shut down.
    rt.block_on(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install shutdown signal handler");
        }
    });
    info!("vrouter-agentd shutting down");
    Ok(())
}

/// Drives the aging loop on its own self-resubmitting schedule, re-reading
/// `flow_timer_interval_ms` after every pass so the adaptive pacing of §4.5
/// actually takes effect between passes.
fn spawn_aging_loop(scheduler: Arc<TaskScheduler>, class_id: vra_scheduler::TaskClassId, ager: Arc<FlowAger<SystemClock>>) {
    let instance_key = InstanceKey::new("flow-aging");
    schedule_pass(scheduler, class_id, instance_key, ager);
}

fn schedule_pass(
    scheduler: Arc<TaskScheduler>,
    class_id: vra_scheduler::TaskClassId,
    instance_key: InstanceKey,
    ager: Arc<FlowAger<SystemClock>>,
) {
    let scheduler_for_task = Arc::clone(&scheduler);
    let instance_key_for_task = instance_key.clone();
    scheduler.enqueue(class_id, instance_key.clone(), async move {
        let report = ager.run_pass();
        if report.visited > 0 {
            tracing::debug!(visited = report.visited, deleted = report.deleted, "flow aging pass");
        }
        let interval = Duration::from_millis(ager.flow_timer_interval_ms());
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            schedule_pass(scheduler_for_task, class_id, instance_key_for_task, ager);
        });
    });
}

fn main() -> ExitCode {
    let overrides = CliOverrides::parse();
    let mut config = match AgentConfig::from_file(&overrides.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("vrouter-agentd: failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };
    overrides.apply(&mut config);
    if let Err(err) = config.validate() {
        eprintln!("vrouter-agentd: invalid config: {err}");
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("vrouter-agentd: fatal: {err}");
            ExitCode::FAILURE
        }
    }
}
