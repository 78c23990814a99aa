//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use sfo_common::time::duration_to_millis;
use sfo_common::{FailoverSettings, ResourceKind};

use crate::error::FailoverError;

/// Position of a resource inside its failover set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRole {
    Primary,
    Fallback,
}

impl ResourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceRole::Primary => "primary",
            ResourceRole::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named resource of a given kind. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceRef {
    kind: ResourceKind,
    name: String,
}

impl ResourceRef {
    /// Build a reference, rejecting blank names.
    pub fn new(kind: ResourceKind, name: impl AsRef<str>) -> Result<Self, FailoverError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(FailoverError::Configuration(format!(
                "{} resource name must not be empty",
                kind
            )));
        }
        Ok(Self {
            kind,
            name: name.to_owned(),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A primary resource with an optional fallback of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverSet {
    primary: ResourceRef,
    fallback: Option<ResourceRef>,
}

impl FailoverSet {
    pub fn new(primary: ResourceRef, fallback: Option<ResourceRef>) -> Result<Self, FailoverError> {
        if let Some(fallback) = &fallback {
            if fallback.kind() != primary.kind() {
                return Err(FailoverError::Configuration(format!(
                    "fallback {} must share the kind of primary {}",
                    fallback, primary
                )));
            }
            if fallback == &primary {
                return Err(FailoverError::Configuration(format!(
                    "fallback must differ from primary {}",
                    primary
                )));
            }
        }
        Ok(Self { primary, fallback })
    }

    /// Build a set from names. A blank fallback name means no fallback.
    pub fn from_names(
        kind: ResourceKind,
        primary: &str,
        fallback: Option<&str>,
    ) -> Result<Self, FailoverError> {
        let primary = ResourceRef::new(kind, primary)?;
        let fallback = match fallback.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Some(ResourceRef::new(kind, name)?),
            None => None,
        };
        Self::new(primary, fallback)
    }

    pub fn from_settings(settings: &FailoverSettings) -> Result<Self, FailoverError> {
        Self::from_names(
            settings.kind,
            &settings.primary,
            settings.fallback.as_deref(),
        )
    }

    pub fn kind(&self) -> ResourceKind {
        self.primary.kind()
    }

    pub fn primary(&self) -> &ResourceRef {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&ResourceRef> {
        self.fallback.as_ref()
    }

    /// Resources in declaration order together with their role.
    pub fn members(&self) -> impl Iterator<Item = (ResourceRole, &ResourceRef)> {
        std::iter::once((ResourceRole::Primary, &self.primary)).chain(
            self.fallback
                .iter()
                .map(|fallback| (ResourceRole::Fallback, fallback)),
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known health of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub resource: ResourceRef,
    pub status: HealthStatus,
    pub last_checked_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub response_time_ms: Option<f64>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl HealthRecord {
    pub fn unknown(resource: ResourceRef, now: DateTime<Utc>) -> Self {
        Self {
            resource,
            status: HealthStatus::Unknown,
            last_checked_at: now,
            last_error: None,
            response_time_ms: None,
            last_failure_at: None,
        }
    }
}

/// Status before and after a registry write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HealthTransition {
    pub previous: HealthStatus,
    pub current: HealthStatus,
}

impl HealthTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    pub fn is_recovery(&self) -> bool {
        self.previous == HealthStatus::Unhealthy && self.current == HealthStatus::Healthy
    }
}

/// Outcome of a single health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub resource: ResourceRef,
    pub healthy: bool,
    pub response_time_ms: f64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn healthy(resource: ResourceRef, elapsed: Duration) -> Self {
        Self {
            resource,
            healthy: true,
            response_time_ms: duration_to_millis(elapsed),
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(resource: ResourceRef, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            resource,
            healthy: false,
            response_time_ms: duration_to_millis(elapsed),
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }
}

/// System-wide roll-up of probe results.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn from_counts(healthy: usize, unhealthy: usize) -> Self {
        if unhealthy == 0 {
            OverallStatus::Healthy
        } else if healthy == 0 {
            OverallStatus::Unhealthy
        } else {
            OverallStatus::Degraded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }

    /// HTTP status code reported by the health route.
    pub fn http_status(&self) -> u16 {
        match self {
            OverallStatus::Healthy => 200,
            OverallStatus::Degraded => 207,
            OverallStatus::Unhealthy => 503,
        }
    }

    /// Process exit code reported by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            OverallStatus::Healthy => 0,
            OverallStatus::Degraded => 1,
            OverallStatus::Unhealthy => 2,
        }
    }

    /// Value exported on the `sfo_overall_status` gauge.
    pub fn metric_code(&self) -> i64 {
        self.exit_code() as i64
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Aggregated health of every probed resource, grouped by kind.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub overall_status: OverallStatus,
    pub per_resource: IndexMap<ResourceKind, Vec<ProbeResult>>,
    pub summary: HealthSummary,
    pub generated_at: DateTime<Utc>,
}

impl AggregateReport {
    /// Compute counts and overall status from grouped results.
    pub fn from_results(per_resource: IndexMap<ResourceKind, Vec<ProbeResult>>) -> Self {
        let mut summary = HealthSummary::default();
        for result in per_resource.values().flatten() {
            summary.total += 1;
            if result.healthy {
                summary.healthy += 1;
            } else {
                summary.unhealthy += 1;
            }
        }
        Self {
            overall_status: OverallStatus::from_counts(summary.healthy, summary.unhealthy),
            per_resource,
            summary,
            generated_at: Utc::now(),
        }
    }

    /// Report restricted to one kind, with counts recomputed.
    pub fn for_kind(&self, kind: ResourceKind) -> Option<AggregateReport> {
        let results = self.per_resource.get(&kind)?.clone();
        let mut per_resource = IndexMap::new();
        per_resource.insert(kind, results);
        let mut report = AggregateReport::from_results(per_resource);
        report.generated_at = self.generated_at;
        Some(report)
    }
}
