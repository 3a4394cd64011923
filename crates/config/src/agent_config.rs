// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::tunnel::TunnelType;

/// Every recognized process option (§6 "External Interfaces"), loaded from a
/// TOML file and layered with CLI overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub xmpp_server_1: String,
    #[serde(default)]
    pub xmpp_server_2: Option<String>,
    pub dns_server_1: String,
    #[serde(default)]
    pub dns_server_2: Option<String>,
    #[serde(default)]
    pub discovery_server: Option<String>,
    #[serde(default = "default_xmpp_instance_count")]
    pub xmpp_instance_count: u32,

    pub vhost_name: String,
    pub eth_port: String,
    pub host_name: String,
    #[serde(default = "default_program_name")]
    pub program_name: String,

    #[serde(default = "default_http_server_port")]
    pub http_server_port: u16,

    #[serde(default)]
    pub tunnel_type: TunnelType,

    #[serde(default)]
    pub log_local: bool,
    #[serde(default = "default_log_category")]
    pub log_category: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub collector: String,
    #[serde(default = "default_collector_port")]
    pub collector_port: u16,

    #[serde(default)]
    pub metadata_shared_secret: Option<String>,
}

fn default_xmpp_instance_count() -> u32 {
    2
}

fn default_program_name() -> String {
    "vrouter-agentd".to_string()
}

fn default_http_server_port() -> u16 {
    8085
}

fn default_log_category() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "SYS_NOTICE".to_string()
}

fn default_collector_port() -> u16 {
    8086
}

impl AgentConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { path: "<string>".to_string(), source })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Beyond what serde already rejects (missing required fields, wrong
    /// types), check the options that are merely present-but-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xmpp_server_1.trim().is_empty() {
            return Err(ConfigError::MissingRequired("xmpp_server_1"));
        }
        if self.dns_server_1.trim().is_empty() {
            return Err(ConfigError::MissingRequired("dns_server_1"));
        }
        if self.host_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("host_name"));
        }
        if self.eth_port.trim().is_empty() {
            return Err(ConfigError::MissingRequired("eth_port"));
        }
        if self.collector.trim().is_empty() {
            return Err(ConfigError::MissingRequired("collector"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            xmpp_server_1 = "10.0.0.1"
            dns_server_1 = "10.0.0.2"
            vhost_name = "vhost0"
            eth_port = "eth0"
            host_name = "compute-1"
            collector = "10.0.0.3"
        "#
    }

    #[test]
    fn minimal_config_fills_in_defaults() {
        let config = AgentConfig::from_toml_str(minimal_toml()).unwrap();
        assert_eq!(config.http_server_port, 8085);
        assert_eq!(config.collector_port, 8086);
        assert_eq!(config.xmpp_instance_count, 2);
        assert_eq!(config.tunnel_type, TunnelType::MplsGre);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tunnel_type_is_parsed_from_its_wire_string() {
        let toml = format!("{}\ntunnel_type = \"VXLAN\"\n", minimal_toml());
        let config = AgentConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.tunnel_type, TunnelType::Vxlan);
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let err = AgentConfig::from_toml_str("dns_server_1 = \"10.0.0.2\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn blank_required_value_fails_validation() {
        let toml = r#"
            xmpp_server_1 = ""
            dns_server_1 = "10.0.0.2"
            vhost_name = "vhost0"
            eth_port = "eth0"
            host_name = "compute-1"
            collector = "10.0.0.3"
        "#;
        let config = AgentConfig::from_toml_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired("xmpp_server_1"))));
    }

    #[test]
    fn from_file_reads_and_parses_a_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, minimal_toml()).unwrap();
        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.host_name, "compute-1");
    }

    #[test]
    fn from_file_reports_io_error_for_a_missing_path() {
        let err = AgentConfig::from_file("/nonexistent/path/agent.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
