// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vrouter-agentd` command-line overlay: a handful of commonly-overridden
//! flags layered on top of the TOML file (§6).

use std::path::PathBuf;

use clap::Parser;

use crate::agent_config::AgentConfig;

#[derive(Parser, Debug)]
#[command(name = "vrouter-agentd", about = "Virtual router control agent")]
pub struct CliOverrides {
    /// Path to the TOML config file.
    #[arg(long, env = "VROUTER_AGENT_CONFIG", default_value = "/etc/contrail/contrail-vrouter-agent.conf")]
    pub config: PathBuf,

    /// Overrides `http_server_port` from the config file.
    #[arg(long)]
    pub http_server_port: Option<u16>,

    /// Overrides `log_level` from the config file.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliOverrides {
    /// Applies this overlay onto a config already loaded from the TOML file,
    /// in the order §6 specifies: CLI flags win over file values.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(port) = self.http_server_port {
            config.http_server_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}
