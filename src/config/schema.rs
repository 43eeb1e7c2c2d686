//! Configuration schema definitions.
//!
//! Supervisor settings. Every section has defaults so an empty file (or no
//! file at all) is a valid configuration; the environment overlay in
//! [`crate::config::cli`] is applied on top.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the engine supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Engine binary and file locations.
    pub engine: EngineSettings,

    /// Subscription feed settings.
    pub subscription: SubscriptionConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Control surface settings.
    pub control: ControlConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl SupervisorConfig {
    /// Health re-checks only run against subscription endpoints.
    pub fn health_check_active(&self) -> bool {
        self.health_check.enabled && self.subscription.url.is_some()
    }
}

/// Engine process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Bootstrap engine config; also receives the subscription-managed copy.
    pub config_path: PathBuf,

    /// Engine executable.
    pub binary: PathBuf,

    /// Directory exported to the engine as its asset location.
    pub asset_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/opt/v2ray/config.json"),
            binary: PathBuf::from("/opt/v2ray/v2ray"),
            asset_dir: PathBuf::from("/opt/v2ray/asset"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Feed URL. Subscription and health features are off when unset.
    pub url: Option<String>,

    /// Reconciliation period in seconds (shared with health re-checks).
    pub period_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            url: None,
            period_secs: 60,
        }
    }
}

impl SubscriptionConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic health re-checks. Off unless asked for.
    pub enabled: bool,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// URL fetched through each endpoint.
    pub url: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 5,
            url: "https://httpbin.org/get".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Listen port on all interfaces; 0 (the default) disables the control
    /// surface.
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { port: 0 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Install the Prometheus recorder backing `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
