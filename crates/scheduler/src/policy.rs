// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The concrete exclusion graph this system requires (§4.1 policy table).

use vra_core::AgentError;

use crate::scheduler::TaskScheduler;

/// Canonical class names, exported so other crates don't hand-type strings
/// that could typo-diverge from the policy table.
pub mod class_names {
    pub const DB_TABLE: &str = "db::DBTable";
    pub const FLOW_HANDLER: &str = "FlowHandler";
    pub const SERVICES: &str = "Services";
    pub const STATS_COLLECTOR: &str = "StatsCollector";
    pub const SANDESH_RECV: &str = "SandeshRecv";
    pub const IO_READER: &str = "IoReader";
    pub const UVE: &str = "Uve";
    pub const KSYNC: &str = "KSync";
    pub const BGP_CONFIG: &str = "bgp::Config";
    pub const XMPP_STATE_MACHINE: &str = "xmpp::StateMachine";
}

/// Install exactly the policy table of §4.1. The symmetric closure is
/// computed by [`crate::class::Policy::register`], so declaring the
/// exclusion only from one side (as the table below does) is sufficient.
pub fn install_default_policy(scheduler: &TaskScheduler) -> Result<(), AgentError> {
    use class_names::*;

    scheduler.register_class(
        DB_TABLE,
        &[FLOW_HANDLER, SERVICES, STATS_COLLECTOR, SANDESH_RECV, IO_READER, UVE, KSYNC],
    )?;
    scheduler.register_class(FLOW_HANDLER, &[STATS_COLLECTOR, IO_READER])?;
    scheduler.register_class(
        SANDESH_RECV,
        &[DB_TABLE, FLOW_HANDLER, SERVICES, STATS_COLLECTOR, IO_READER],
    )?;
    scheduler.register_class(
        BGP_CONFIG,
        &[
            FLOW_HANDLER,
            SERVICES,
            STATS_COLLECTOR,
            SANDESH_RECV,
            IO_READER,
            XMPP_STATE_MACHINE,
            DB_TABLE,
        ],
    )?;
    scheduler.register_class(XMPP_STATE_MACHINE, &[IO_READER, DB_TABLE])?;
    scheduler.register_class(KSYNC, &[FLOW_HANDLER, STATS_COLLECTOR, DB_TABLE])?;

    // Classes named only as exclusion targets above still need an id of
    // their own so callers can enqueue work under them.
    scheduler.register_class(SERVICES, &[])?;
    scheduler.register_class(STATS_COLLECTOR, &[])?;
    scheduler.register_class(IO_READER, &[])?;
    scheduler.register_class(UVE, &[])?;

    Ok(())
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
