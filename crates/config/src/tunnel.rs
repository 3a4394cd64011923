// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// Encapsulation used for traffic forwarded off this host (§6).
///
/// The mapping from the wire string is a value mapping, not an
/// enumeration tag: anything other than `"MPLSoUDP"`/`"VXLAN"` falls back
/// to `MplsGre` rather than failing to parse, so this is implemented by
/// hand instead of via serde's derived enum representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunnelType {
    MplsUdp,
    Vxlan,
    #[default]
    MplsGre,
}

impl FromStr for TunnelType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "MPLSoUDP" => TunnelType::MplsUdp,
            "VXLAN" => TunnelType::Vxlan,
            _ => TunnelType::MplsGre,
        })
    }
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunnelType::MplsUdp => "MPLSoUDP",
            TunnelType::Vxlan => "VXLAN",
            TunnelType::MplsGre => "MPLSGRE",
        };
        f.write_str(s)
    }
}

impl<'de> Deserialize<'de> for TunnelType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "MPLSoUDP" => TunnelType::MplsUdp,
            "VXLAN" => TunnelType::Vxlan,
            _ => TunnelType::MplsGre,
        })
    }
}
