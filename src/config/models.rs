// src/config/models.rs
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DEPENDENCY_ADDRESS: &str = "http://localhost:9200";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub checks: CheckToggles,
    #[serde(default)]
    pub dependency: DependencyConfig,
    #[serde(default)]
    pub provenance: ProvenanceConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_path")]
    pub path: String,
    /// Process start time used for the uptime string. Filled in at load time
    /// when neither the file nor `API_STARTED` provide it.
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
}

/// Which checks run on each request. Every check is on unless turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CheckToggles {
    #[serde(default = "enabled")]
    pub dependency_status: bool,
    #[serde(default = "enabled")]
    pub provenance_status: bool,
    #[serde(default = "enabled")]
    pub origin_echo: bool,
    #[serde(default = "enabled")]
    pub api_version: bool,
    #[serde(default = "enabled")]
    pub system_stats: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    #[serde(default = "default_dependency_address")]
    pub address: String,
    #[serde(default = "default_dependency_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvenanceConfig {
    #[serde(default = "default_provenance_command")]
    pub command: Vec<String>,
    #[serde(default = "default_provenance_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Version reported by the api_version check. Unset means this crate's own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            started: None,
        }
    }
}

impl Default for CheckToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            address: default_dependency_address(),
            timeout_ms: default_dependency_timeout_ms(),
        }
    }
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            command: default_provenance_command(),
            timeout_ms: default_provenance_timeout_ms(),
        }
    }
}

impl CheckToggles {
    pub fn all() -> Self {
        Self {
            dependency_status: true,
            provenance_status: true,
            origin_echo: true,
            api_version: true,
            system_stats: true,
        }
    }

    pub fn none() -> Self {
        Self {
            dependency_status: false,
            provenance_status: false,
            origin_echo: false,
            api_version: false,
            system_stats: false,
        }
    }
}

impl DependencyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The address as a URL. A bare `host:port` is treated as plain HTTP.
    pub fn url(&self) -> Result<Url> {
        let raw = self.address.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };
        Url::parse(&candidate)
            .with_context(|| format!("Invalid dependency address: {}", self.address))
    }
}

impl ProvenanceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.dependency.url()?;

        if self.dependency.timeout_ms == 0 {
            bail!("dependency.timeout_ms must be greater than zero");
        }
        if self.provenance.timeout_ms == 0 {
            bail!("provenance.timeout_ms must be greater than zero");
        }
        if self.provenance.command.is_empty() {
            bail!("provenance.command must name a program");
        }
        if !self.health.path.starts_with('/') {
            bail!("health.path must start with '/': {}", self.health.path);
        }

        Ok(())
    }

    pub fn api_version(&self) -> &str {
        self.api
            .version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }

    /// Start time, falling back to now for configs built without `load_config`.
    pub fn started(&self) -> DateTime<Utc> {
        self.health.started.unwrap_or_else(Utc::now)
    }
}

fn enabled() -> bool {
    true
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_dependency_address() -> String {
    DEFAULT_DEPENDENCY_ADDRESS.to_string()
}

fn default_dependency_timeout_ms() -> u64 {
    1500
}

fn default_provenance_command() -> Vec<String> {
    vec!["git".into(), "rev-parse".into(), "HEAD".into()]
}

fn default_provenance_timeout_ms() -> u64 {
    5000
}
