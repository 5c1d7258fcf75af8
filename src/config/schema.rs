//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the balancer runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener for the metrics and admin HTTP server.
    pub listener: ListenerConfig,

    /// Data-plane listener that forwards calls to the selected backend.
    pub proxy: ProxyConfig,

    /// Initial backend membership.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Backend selection strategy.
    pub balancer: StrategyConfig,

    /// Caller-side retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl BalancerConfig {
    /// Addresses of all configured backends, in file order.
    pub fn backend_addresses(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.address.clone()).collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Pass-through proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Serve the data-plane listener.
    pub enabled: bool,

    /// Bind address for inbound calls (HTTP/1.1 or h2c).
    pub bind_address: String,

    /// Speak HTTP/2 with prior knowledge to backends, as gRPC servers expect.
    pub http2_only: bool,

    /// Deadline for a backend to answer one attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body buffered for forwarding and replay.
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:50051".to_string(),
            http2_only: true,
            request_timeout_secs: 30,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend address (e.g., "127.0.0.1:50051").
    pub address: String,
}

/// Which liveness probe to run against backends.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// HTTP GET against `path`; any 2xx is alive.
    #[default]
    Http,
    /// Plain TCP connect.
    Tcp,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Probe flavour.
    pub probe: ProbeKind,

    /// Path to probe for HTTP health checks.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            unhealthy_threshold: 3,
            probe: ProbeKind::Http,
            path: "/health".to_string(),
        }
    }
}

/// Backend selection strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Random,
}

/// Balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StrategyConfig {
    pub strategy: StrategyKind,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Path the metrics exposition is served on.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// Key shipped in the defaults. Validation refuses it while the admin API
/// is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin routes. Requires a real `api_key`.
    pub enabled: bool,

    /// API key for mutating routes (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: BalancerConfig = toml::from_str(
            r#"
            [[backends]]
            address = "10.0.0.1:50051"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend_addresses(), vec!["10.0.0.1:50051".to_string()]);
        assert_eq!(config.health_check.interval_secs, 30);
        assert_eq!(config.health_check.timeout_secs, 5);
        assert_eq!(config.health_check.probe, ProbeKind::Http);
        assert_eq!(config.balancer.strategy, StrategyKind::RoundRobin);
        assert!(!config.retries.enabled);
        assert!(config.proxy.enabled);
        assert!(config.proxy.http2_only);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_enum_fields_are_snake_case() {
        let config: BalancerConfig = toml::from_str(
            r#"
            [health_check]
            probe = "tcp"
            unhealthy_threshold = 2

            [balancer]
            strategy = "random"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.health_check.probe, ProbeKind::Tcp);
        assert_eq!(config.health_check.unhealthy_threshold, 2);
        assert_eq!(config.balancer.strategy, StrategyKind::Random);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
