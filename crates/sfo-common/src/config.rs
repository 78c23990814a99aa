//! ---
//! sfo_section: "01-core-functionality"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Shared primitives and utilities for the failover runtime."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::kind::ResourceKind;
use crate::logging::LogFormat;

fn default_true() -> bool {
    true
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

fn default_route_path() -> String {
    "/health/smart-failover".to_owned()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(300)
}

fn default_health_services() -> Vec<ResourceKind> {
    vec![
        ResourceKind::Database,
        ResourceKind::Cache,
        ResourceKind::Queue,
    ]
}

fn default_channels() -> Vec<AlertChannel> {
    vec![AlertChannel::Log]
}

/// Longest accepted alert suppression window.
pub const MAX_THROTTLE_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn default_throttle_window() -> Duration {
    Duration::from_secs(15 * 60)
}

/// Primary configuration object for the failover runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub failover: IndexMap<ResourceKind, KindFailoverConfig>,
    #[serde(default)]
    pub resources: IndexMap<ResourceKind, IndexMap<String, ResourceEndpoint>>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "SFO_CONFIG";

    /// Load configuration from disk, respecting the `SFO_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolved failover settings for a kind, if configured and enabled.
    pub fn failover_settings(&self, kind: ResourceKind) -> Option<FailoverSettings> {
        self.failover
            .get(&kind)
            .filter(|cfg| cfg.enabled)
            .map(|cfg| cfg.resolve(kind))
    }

    /// Kinds with an enabled failover route, in canonical order.
    pub fn enabled_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| self.failover.get(kind).map_or(false, |cfg| cfg.enabled))
            .collect()
    }

    /// Kinds the health aggregator should probe, deduplicated in canonical order.
    pub fn health_services(&self) -> Vec<ResourceKind> {
        if !self.health_check.enabled {
            return Vec::new();
        }
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| self.health_check.services.contains(kind))
            .collect()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for (kind, cfg) in &self.failover {
            if cfg.enabled {
                cfg.validate(*kind)?;
            }
        }
        for (kind, entries) in &self.resources {
            for (name, endpoint) in entries {
                endpoint.validate(*kind, name)?;
            }
        }
        self.health_check.validate()?;
        self.notifications.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Raw per-kind failover table (`[failover.<kind>]`). Unset knobs fall back to the
/// kind defaults when resolved.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindFailoverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default, rename = "retry_delay_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub retry_delay: Option<Duration>,
    #[serde(default)]
    pub exponential_backoff: Option<bool>,
    #[serde(default)]
    pub graceful_degradation: Option<bool>,
    #[serde(default)]
    pub prefer_healthy: bool,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub health_check_interval: Option<Duration>,
}

impl KindFailoverConfig {
    /// Construct an enabled table with only the resource names set.
    pub fn new(primary: impl Into<String>, fallback: Option<&str>) -> Self {
        Self {
            enabled: true,
            primary: primary.into(),
            fallback: fallback.map(ToOwned::to_owned),
            retry_attempts: None,
            retry_delay: None,
            exponential_backoff: None,
            graceful_degradation: None,
            prefer_healthy: false,
            health_check_interval: None,
        }
    }

    fn validate(&self, kind: ResourceKind) -> Result<()> {
        if self.primary.trim().is_empty() {
            return Err(anyhow!(
                "failover.{} must define a non-empty primary resource",
                kind
            ));
        }
        if let Some(fallback) = self.fallback.as_deref() {
            if fallback.trim() == self.primary.trim() {
                return Err(anyhow!(
                    "failover.{} fallback must differ from primary '{}'",
                    kind,
                    self.primary
                ));
            }
        }
        if self.retry_attempts == Some(0) {
            return Err(anyhow!("failover.{} retry_attempts must be at least 1", kind));
        }
        Ok(())
    }

    /// Merge the table with the defaults of `kind`.
    pub fn resolve(&self, kind: ResourceKind) -> FailoverSettings {
        let defaults = FailoverSettings::defaults_for(kind);
        FailoverSettings {
            kind,
            primary: self.primary.trim().to_owned(),
            fallback: self
                .fallback
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToOwned::to_owned),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            exponential_backoff: self
                .exponential_backoff
                .unwrap_or(defaults.exponential_backoff),
            graceful_degradation: self
                .graceful_degradation
                .unwrap_or(defaults.graceful_degradation),
            prefer_healthy: self.prefer_healthy,
            health_check_interval: self
                .health_check_interval
                .unwrap_or(defaults.health_check_interval),
        }
    }
}

/// Fully resolved failover settings for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverSettings {
    pub kind: ResourceKind,
    pub primary: String,
    pub fallback: Option<String>,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub exponential_backoff: bool,
    pub graceful_degradation: bool,
    pub prefer_healthy: bool,
    pub health_check_interval: Duration,
}

impl FailoverSettings {
    /// Defaults applied per kind when a table leaves a knob unset. Resource names are
    /// left empty and must come from configuration.
    pub fn defaults_for(kind: ResourceKind) -> Self {
        let (retry_attempts, retry_delay_ms, exponential_backoff, graceful_degradation, interval) =
            match kind {
                ResourceKind::Database => (3, 1_000, false, true, 30),
                ResourceKind::Cache => (2, 500, false, true, 30),
                ResourceKind::Queue => (3, 2_000, true, false, 60),
                ResourceKind::Mail => (3, 1_000, false, false, 30),
                ResourceKind::Storage => (3, 1_000, false, false, 30),
            };
        Self {
            kind,
            primary: String::new(),
            fallback: None,
            retry_attempts,
            retry_delay: Duration::from_millis(retry_delay_ms),
            exponential_backoff,
            graceful_degradation,
            prefer_healthy: false,
            health_check_interval: Duration::from_secs(interval),
        }
    }
}

/// Location of a concrete resource used by probes and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ResourceEndpoint {
    /// `host:port` for network-backed resources.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Directory for storage volumes.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ResourceEndpoint {
    fn validate(&self, kind: ResourceKind, name: &str) -> Result<()> {
        match (&self.endpoint, &self.path) {
            (Some(_), Some(_)) => Err(anyhow!(
                "resources.{}.{} must declare either endpoint or path, not both",
                kind,
                name
            )),
            (None, None) => Err(anyhow!(
                "resources.{}.{} must declare an endpoint or a path",
                kind,
                name
            )),
            _ => Ok(()),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub route_enabled: bool,
    #[serde(default = "default_route_path")]
    pub route_path: String,
    #[serde(default = "default_probe_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Sweep period for monitored kinds without a failover route. Routed kinds use
    /// their own `health_check_interval`.
    #[serde(default = "default_check_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_cooldown")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cooldown: Duration,
    #[serde(default = "default_health_services")]
    pub services: Vec<ResourceKind>,
}

impl HealthCheckConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(anyhow!("health_check.timeout must be greater than zero"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("health_check.interval must be greater than zero"));
        }
        if !self.route_path.starts_with('/') {
            return Err(anyhow!(
                "health_check.route_path '{}' must start with '/'",
                self.route_path
            ));
        }
        Ok(())
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            route_enabled: true,
            route_path: default_route_path(),
            timeout: default_probe_timeout(),
            interval: default_check_interval(),
            cooldown: default_cooldown(),
            services: default_health_services(),
        }
    }
}

/// Alert delivery channels an operator can select.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Slack,
    Telegram,
    Email,
    Log,
}

impl AlertChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertChannel::Slack => "slack",
            AlertChannel::Telegram => "telegram",
            AlertChannel::Email => "email",
            AlertChannel::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_channels")]
    pub channels: Vec<AlertChannel>,
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl NotificationsConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.channels.is_empty() {
            return Err(anyhow!(
                "notifications are enabled but no channels are configured"
            ));
        }
        if self.throttle.enabled && self.throttle.window.is_zero() {
            return Err(anyhow!("notifications.throttle.window must be greater than zero"));
        }
        if self.throttle.window > MAX_THROTTLE_WINDOW {
            return Err(anyhow!(
                "notifications.throttle.window must not exceed {} seconds",
                MAX_THROTTLE_WINDOW.as_secs()
            ));
        }
        Ok(())
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: default_channels(),
            throttle: ThrottleConfig::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_throttle_window")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: default_throttle_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_metrics_listen(),
        }
    }
}
