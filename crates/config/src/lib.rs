// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vra-config: process configuration for `vrouter-agentd` (§6).
//!
//! The recognized options are loaded from a TOML file via
//! [`AgentConfig::from_file`] and layered with a small
//! [`cli::CliOverrides`] clap overlay on top, a file-then-flags layering
//! consistent with this workspace's other CLI entrypoints.

mod agent_config;
mod cli;
mod error;
mod tunnel;
pub mod well_known;

pub use agent_config::AgentConfig;
pub use cli::CliOverrides;
pub use error::ConfigError;
pub use tunnel::TunnelType;
