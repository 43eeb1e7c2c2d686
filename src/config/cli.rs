//! Command line and environment overlay.
//!
//! Each setting can come from a flag or its environment variable; when both
//! are absent the settings file (or the built-in default) wins.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{load_settings, validate, ConfigError};
use crate::config::schema::SupervisorConfig;

#[derive(Debug, Parser)]
#[command(name = "engine-supervisor", version, about = "Proxy engine supervisor")]
pub struct Cli {
    /// Supervisor settings file (TOML)
    #[arg(long, env = "VC_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Bootstrap engine config
    #[arg(long = "config", env = "V2RAY_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Subscription feed URL
    #[arg(long = "sub-url", env = "VC_SUB_URL")]
    pub sub_url: Option<String>,

    /// Health re-checks; off when unset, and any value but false/off/0 enables them
    #[arg(long = "sub-check", env = "VC_SUB_CHECK", value_parser = parse_toggle)]
    pub sub_check: Option<bool>,

    /// Reconciliation period in seconds
    #[arg(long = "check-period", env = "VC_CHECK_PERIOD")]
    pub check_period: Option<u64>,

    /// Probe timeout in seconds
    #[arg(long = "check-timeout", env = "VC_CHECK_TIMEOUT")]
    pub check_timeout: Option<u64>,

    /// URL fetched through each endpoint
    #[arg(long = "check-url", env = "VC_CHECK_URL")]
    pub check_url: Option<String>,

    /// Engine asset directory
    #[arg(long = "asset-dir", env = "V2RAY_ASSET")]
    pub asset_dir: Option<PathBuf>,

    /// Engine binary
    #[arg(long = "binary", env = "V2RAY_BIN")]
    pub binary: Option<PathBuf>,

    /// Control surface port, 0 disables it
    #[arg(long = "api-port", env = "VC_API_PORT")]
    pub api_port: Option<u16>,

    /// Log level when RUST_LOG is unset
    #[arg(long = "log-level", env = "VC_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Parse an on/off switch. Only an explicit negative disables.
pub fn parse_toggle(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "false" | "off" | "0" => Ok(false),
        _ => Ok(true),
    }
}

impl Cli {
    /// Build the effective configuration: settings file, then overlay, then
    /// validation.
    pub fn resolve(self) -> Result<SupervisorConfig, ConfigError> {
        let base = match &self.settings {
            Some(path) => load_settings(path)?,
            None => SupervisorConfig::default(),
        };
        validate(self.apply(base))
    }

    pub fn apply(self, mut config: SupervisorConfig) -> SupervisorConfig {
        if let Some(path) = self.config_path {
            config.engine.config_path = path;
        }
        if let Some(binary) = self.binary {
            config.engine.binary = binary;
        }
        if let Some(dir) = self.asset_dir {
            config.engine.asset_dir = dir;
        }
        if let Some(url) = self.sub_url {
            let url = url.trim().to_string();
            config.subscription.url = (!url.is_empty()).then_some(url);
        }
        if let Some(period) = self.check_period {
            config.subscription.period_secs = period;
        }
        if let Some(enabled) = self.sub_check {
            config.health_check.enabled = enabled;
        }
        if let Some(timeout) = self.check_timeout {
            config.health_check.timeout_secs = timeout;
        }
        if let Some(url) = self.check_url {
            config.health_check.url = url;
        }
        if let Some(port) = self.api_port {
            config.control.port = port;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        config
    }
}
