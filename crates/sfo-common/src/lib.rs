//! ---
//! sfo_section: "01-core-functionality"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Shared primitives and utilities for the failover runtime."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Shared primitives for the smart failover workspace.
//! This crate exposes configuration loading, the resource kind vocabulary,
//! logging bootstrap and small timing helpers consumed across the workspace.

pub mod config;
pub mod kind;
pub mod logging;
pub mod time;

pub use config::{
    AlertChannel, AppConfig, FailoverSettings, HealthCheckConfig, KindFailoverConfig,
    LoadedAppConfig, LoggingConfig, MetricsConfig, NotificationsConfig, ResourceEndpoint,
    ThrottleConfig,
};
pub use kind::ResourceKind;
pub use logging::{init_tracing, LogFormat};
