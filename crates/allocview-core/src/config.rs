//! allocview.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocviewConfig {
    pub server: ServerConfig,
    pub explain: ExplainConfig,
    pub cluster: ClusterConfig,
    pub tenancy: TenancyConfig,
    pub deciders: DecidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Caller-side timeout for a single explain request (e.g. "30s").
    pub request_timeout: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9200".to_string(),
            request_timeout: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Upper bound on explain requests evaluated at the same time.
    pub management_workers: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            management_workers: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// JSON cluster-state document the daemon serves snapshots from.
    pub state_file: Option<PathBuf>,
    /// How often the state file is re-read (e.g. "10s").
    pub reload_interval: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            reload_interval: "10s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenancyMode {
    /// Every caller sees the default tenant only.
    #[default]
    Single,
    /// The caller names its tenant in a request header.
    Multi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    pub mode: TenancyMode,
    pub default_tenant: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            mode: TenancyMode::Single,
            default_tenant: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecidersConfig {
    /// Fraction of disk in use above which no shard may be allocated to a node.
    pub disk_high_watermark: f64,
    /// Initializing copies a node may carry before further allocations throttle.
    pub node_concurrent_recoveries: u32,
}

impl Default for DecidersConfig {
    fn default() -> Self {
        Self {
            disk_high_watermark: 0.9,
            node_concurrent_recoveries: 2,
        }
    }
}

/// Parse a duration setting that must be greater than zero.
fn positive_duration(key: &str, value: &str) -> anyhow::Result<Duration> {
    match parse_duration(value) {
        Some(d) if d.is_zero() => anyhow::bail!("{key} must be greater than zero, got {value:?}"),
        Some(d) => Ok(d),
        None => anyhow::bail!("invalid {key}: {value:?}"),
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        positive_duration("server.request_timeout", &self.request_timeout)
    }
}

impl ClusterConfig {
    pub fn reload_interval(&self) -> anyhow::Result<Duration> {
        positive_duration("cluster.reload_interval", &self.reload_interval)
    }
}

impl AllocviewConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AllocviewConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.explain.management_workers == 0 {
            anyhow::bail!("explain.management_workers must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.deciders.disk_high_watermark) {
            anyhow::bail!(
                "deciders.disk_high_watermark must be within [0.0, 1.0], got {}",
                self.deciders.disk_high_watermark
            );
        }
        if self.tenancy.default_tenant.is_empty() {
            anyhow::bail!("tenancy.default_tenant must not be empty");
        }
        self.server.request_timeout()?;
        self.cluster.reload_interval()?;
        Ok(())
    }
}
