//! Configuration schema definitions.
//!
//! This module defines the settings of the routing engine process itself.
//! Routing rules are not part of it; they arrive as rule text through a
//! `RuleSource`. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

/// Root configuration for the engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Process-level routing switches.
    pub routing: RoutingConfig,

    /// Where rule text is read from and how changes are detected.
    pub rules: RulesConfig,

    /// Local host identity discovery.
    pub identity: IdentityConfig,

    /// Stand-in fallback balancer.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Process-level routing switches.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Prefer instances running on this host for every outbound call.
    pub debug_local: bool,
}

/// Rule source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Path to the rule text file.
    pub path: String,

    /// Watch the file and hot-reload on change.
    pub watch: bool,

    /// Poll interval for watcher backends that poll, in seconds.
    pub poll_interval_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: "smart-route.properties".to_string(),
            watch: true,
            poll_interval_secs: 2,
        }
    }
}

/// Local identity discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Addresses owned by this host that discovery cannot see.
    pub extra_addresses: Vec<String>,

    /// Count every interface address of this host.
    pub discover_interfaces: bool,

    /// Address used to discover the outbound interface (no traffic is sent).
    pub probe_address: String,

    /// Treat loopback as one of this host's addresses. Every host owns it,
    /// so `debug.127.0.0.1` / `test.127.0.0.1` rules then apply fleet-wide.
    pub include_loopback: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            extra_addresses: Vec::new(),
            discover_interfaces: true,
            probe_address: "8.8.8.8:80".to_string(),
            include_loopback: false,
        }
    }
}

/// Fallback balancer strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// Fallback balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    pub strategy: FallbackStrategy,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
