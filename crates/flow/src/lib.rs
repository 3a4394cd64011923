// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Flow-statistics aging and export (§4.5).
//!
//! The flow table shadows per-flow counters the kernel maintains and is
//! aged and exported by a periodic pass driven by [`aging::FlowAger`],
//! rather than by a dedicated scheduler mechanism: it is an ordinary
//! [`vra_db::Table`] plus a timer loop, matching §4.5's "reuses the table
//! and scheduler primitives already defined".

pub mod aging;
pub mod export;
pub mod hooks;
pub mod kernel;
pub mod stats;
pub mod types;

pub use aging::{AgingConfig, FlowAger, PassReport};
pub use export::{ChannelExportSink, FlowDataIpv4, FlowExportSink, RecordingExportSink};
pub use hooks::{FlowHooks, FlowTable};
pub use kernel::{KernelFlowRecord, KernelFlowTable, MockKernelFlowTable, NullKernelFlowTable};
pub use stats::{CountingInterVnStatsSink, InterVnStatsSink, NullInterVnStatsSink};
pub use types::{FlowEntry, FlowFlags, FlowHandle, FlowKey};
