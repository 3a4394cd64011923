// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vra_core::AgentError;

/// Failures loading and validating [`crate::AgentConfig`]. A bad config is
/// always fatal to bootstrap, so every variant converts into
/// [`AgentError::InvariantViolation`] at the `vra-agent` boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },

    #[error("missing required option: {0}")]
    MissingRequired(&'static str),
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        AgentError::invariant(err.to_string())
    }
}
