//! Configuration module for sessiond
//!
//! Supports configuration via:
//! - YAML/TOML config files
//! - Environment variables (with SESSIOND_ prefix, `__` as the nesting separator)

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::AppDefinition;
use crate::session::ProbePolicy;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for the JSON log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Header carrying the user name asserted by the authenticating front end
    #[serde(default = "default_user_header")]
    pub user_header: String,

    /// Bearer token for the admin endpoints (admin API disabled when unset)
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Container runtime settings
    #[serde(default)]
    pub docker: DockerConfig,

    /// Readiness probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Application catalog
    #[serde(default)]
    pub apps: Vec<AppDefinition>,
}

/// Container runtime connection and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Daemon URL; empty means the platform's local defaults
    #[serde(default)]
    pub url: String,

    /// Directory holding key.pem, cert.pem and ca.pem; enables TLS when set
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Image whose containers are reported by the admin container listing
    #[serde(default = "default_image_name")]
    pub image_name: String,

    /// Address at which published container ports are reachable
    #[serde(default = "default_docker_host")]
    pub host: String,

    /// First host port handed out to sessions
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Port the application listens on inside its container
    #[serde(default = "default_container_port")]
    pub container_port: u16,

    /// Daemon request timeout in seconds
    #[serde(default = "default_docker_timeout")]
    pub timeout_secs: u64,
}

/// Readiness probe budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_probe_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/sessiond")
}

fn default_user_header() -> String {
    "x-forwarded-user".to_string()
}

fn default_image_name() -> String {
    "openanalytics/shiny-demo".to_string()
}

fn default_docker_host() -> String {
    "localhost".to_string()
}

fn default_port_range_start() -> u16 {
    20000
}

fn default_container_port() -> u16 {
    3838
}

fn default_docker_timeout() -> u64 {
    120
}

fn default_probe_attempts() -> u32 {
    20
}

fn default_probe_interval_ms() -> u64 {
    500
}

fn default_probe_request_timeout_ms() -> u64 {
    2000
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cert_path: None,
            image_name: default_image_name(),
            host: default_docker_host(),
            port_range_start: default_port_range_start(),
            container_port: default_container_port(),
            timeout_secs: default_docker_timeout(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_probe_attempts(),
            interval_ms: default_probe_interval_ms(),
            request_timeout_ms: default_probe_request_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn policy(&self) -> ProbePolicy {
        ProbePolicy {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            user_header: default_user_header(),
            admin_token: None,
            docker: DockerConfig::default(),
            probe: ProbeConfig::default(),
            apps: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config/sessiond").required(false))
            .add_source(config::File::with_name("/etc/sessiond/config").required(false))
            // Override with environment variables (SESSIOND_ prefix)
            .add_source(
                config::Environment::with_prefix("SESSIOND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.docker.port_range_start == 0 {
            anyhow::bail!("Port range start cannot be 0");
        }

        if self.docker.container_port == 0 {
            anyhow::bail!("Container port cannot be 0");
        }

        if self.probe.max_attempts == 0 {
            anyhow::bail!("Readiness probe needs at least one attempt");
        }

        let mut seen = HashSet::new();
        for app in &self.apps {
            if !seen.insert(app.name.as_str()) {
                anyhow::bail!("Application {} is defined more than once", app.name);
            }
        }

        Ok(())
    }
}
