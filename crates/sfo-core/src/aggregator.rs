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
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use sfo_common::time::human_duration;
use sfo_common::ResourceKind;
use sfo_logging::{sfo_info, sfo_warn, LogContext, TARGET_HEALTH};
use sfo_metrics::FailoverMetrics;
use tokio::time::{timeout, Instant};

use crate::model::{AggregateReport, FailoverSet, ProbeResult, ResourceRef};
use crate::notify::Notifier;
use crate::probe::SharedProbe;
use crate::registry::HealthRegistry;

/// Probes registered resources and rolls the results into one report.
pub struct HealthAggregator {
    registry: Arc<HealthRegistry>,
    probes: IndexMap<ResourceKind, SharedProbe>,
    resources: IndexMap<ResourceKind, Vec<ResourceRef>>,
    timeout: Duration,
    notifier: Option<Arc<Notifier>>,
    metrics: Option<FailoverMetrics>,
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("probes", &self.probes.keys().collect::<Vec<_>>())
            .field("resources", &self.resources)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HealthAggregator {
    pub fn new(registry: Arc<HealthRegistry>, probe_timeout: Duration) -> Self {
        Self {
            registry,
            probes: IndexMap::new(),
            resources: IndexMap::new(),
            timeout: probe_timeout,
            notifier: None,
            metrics: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_metrics(mut self, metrics: FailoverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    pub fn register_probe(&mut self, kind: ResourceKind, probe: SharedProbe) {
        self.probes.insert(kind, probe);
    }

    /// Register a resource for probing. Duplicates are ignored.
    pub fn register_resource(&mut self, resource: ResourceRef) {
        let entries = self.resources.entry(resource.kind()).or_default();
        if !entries.contains(&resource) {
            entries.push(resource);
        }
    }

    pub fn register_set(&mut self, set: &FailoverSet) {
        for (_, resource) in set.members() {
            self.register_resource(resource.clone());
        }
    }

    pub fn registered(&self, kind: ResourceKind) -> &[ResourceRef] {
        self.resources.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_probe(&self, kind: ResourceKind) -> bool {
        self.probes.contains_key(&kind)
    }

    /// Probe every registered resource of the enabled kinds concurrently.
    /// Never fails: probe errors and timeouts become unhealthy results.
    pub async fn check_all(&self, enabled: &[ResourceKind]) -> AggregateReport {
        let mut kinds = enabled.to_vec();
        kinds.sort();
        kinds.dedup();

        let mut per_resource: IndexMap<ResourceKind, Vec<ProbeResult>> = IndexMap::new();
        let mut pending = Vec::new();
        for kind in kinds {
            let Some(probe) = self.probes.get(&kind) else {
                sfo_warn!(
                    target: TARGET_HEALTH,
                    context = LogContext::new().with_kind(kind.as_str()),
                    "no health probe registered for {}; skipping",
                    kind
                );
                continue;
            };
            per_resource.insert(kind, Vec::new());
            for resource in self.registered(kind) {
                pending.push(self.probe_one(probe.clone(), resource));
            }
        }

        for result in join_all(pending).await {
            if let Some(results) = per_resource.get_mut(&result.resource.kind()) {
                results.push(result);
            }
        }

        let report = AggregateReport::from_results(per_resource);
        self.publish_status(&report);
        report
    }

    /// Export the overall status of `report` on the status gauge.
    pub fn publish_status(&self, report: &AggregateReport) {
        if let Some(metrics) = &self.metrics {
            metrics.set_overall_status(report.overall_status.metric_code());
        }
    }

    pub async fn check_kind(&self, kind: ResourceKind) -> AggregateReport {
        self.check_all(&[kind]).await
    }

    /// True when the registry already holds a healthy record for `kind`. Does not probe.
    pub fn is_service_healthy(&self, kind: ResourceKind) -> bool {
        self.registry.any_healthy(kind)
    }

    async fn probe_one(&self, probe: SharedProbe, resource: &ResourceRef) -> ProbeResult {
        let started = Instant::now();
        let result = match timeout(self.timeout, probe.probe(resource)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::unhealthy(
                resource.clone(),
                started.elapsed(),
                format!("probe timed out after {}", human_duration(self.timeout)),
            ),
        };

        let transition = self.registry.record_probe(&result);
        if let Some(metrics) = &self.metrics {
            metrics.record_probe(
                resource.kind().as_str(),
                resource.name(),
                result.healthy,
                started.elapsed(),
            );
        }

        let ctx = LogContext::new()
            .with_kind(resource.kind().as_str())
            .with_resource(resource.name());
        if transition.changed() {
            sfo_info!(
                target: TARGET_HEALTH,
                context = ctx,
                "{} changed from {} to {}",
                resource,
                transition.previous,
                transition.current
            );
        }
        if !result.healthy {
            sfo_warn!(
                target: TARGET_HEALTH,
                context = ctx,
                "probe failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        if transition.is_recovery() {
            if let Some(notifier) = &self.notifier {
                let detail = format!("health probe succeeded in {}ms", result.response_time_ms);
                notifier.notify_recovery(resource, &detail).await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HealthStatus, OverallStatus};
    use crate::probe::HealthProbe;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct NamedProbe {
        failing: HashSet<&'static str>,
    }

    #[async_trait]
    impl HealthProbe for NamedProbe {
        async fn round_trip(&self, resource: &ResourceRef) -> anyhow::Result<()> {
            if self.failing.contains(resource.name()) {
                Err(anyhow!("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl HealthProbe for HangingProbe {
        async fn round_trip(&self, _resource: &ResourceRef) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn aggregator(failing: &[&'static str]) -> HealthAggregator {
        let mut aggregator =
            HealthAggregator::new(Arc::new(HealthRegistry::default()), Duration::from_secs(5));
        aggregator.register_probe(
            ResourceKind::Database,
            Arc::new(NamedProbe {
                failing: failing.iter().copied().collect(),
            }),
        );
        aggregator.register_set(
            &FailoverSet::from_names(ResourceKind::Database, "mysql", Some("backup")).unwrap(),
        );
        aggregator
    }

    #[tokio::test]
    async fn all_healthy_reports_healthy() {
        let aggregator = aggregator(&[]);
        let report = aggregator.check_all(&[ResourceKind::Database]).await;
        assert_eq!(report.overall_status, OverallStatus::Healthy);
        assert_eq!(report.summary.unhealthy, 0);
        assert_eq!(report.summary.total, 2);
        let names: Vec<_> = report.per_resource[&ResourceKind::Database]
            .iter()
            .map(|result| result.resource.name())
            .collect();
        assert_eq!(names, vec!["mysql", "backup"]);
        assert!(aggregator.is_service_healthy(ResourceKind::Database));
    }

    #[tokio::test]
    async fn mixed_results_degrade_and_all_failing_is_unhealthy() {
        let degraded = aggregator(&["backup"])
            .check_all(&[ResourceKind::Database])
            .await;
        assert_eq!(degraded.overall_status, OverallStatus::Degraded);
        assert_eq!(degraded.summary.healthy, 1);

        let down = aggregator(&["mysql", "backup"]);
        let report = down.check_kind(ResourceKind::Database).await;
        assert_eq!(report.overall_status, OverallStatus::Unhealthy);
        assert!(!down.is_service_healthy(ResourceKind::Database));
        let record = down
            .registry()
            .get(&ResourceRef::new(ResourceKind::Database, "mysql").unwrap());
        assert_eq!(record.status, HealthStatus::Unhealthy);
        assert_eq!(record.last_error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn kinds_without_probe_are_skipped() {
        let mut aggregator = aggregator(&[]);
        aggregator.register_resource(ResourceRef::new(ResourceKind::Cache, "redis").unwrap());
        let report = aggregator
            .check_all(&[ResourceKind::Cache, ResourceKind::Database])
            .await;
        assert!(!report.per_resource.contains_key(&ResourceKind::Cache));
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.overall_status, OverallStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probes_time_out_as_unhealthy() {
        let mut aggregator =
            HealthAggregator::new(Arc::new(HealthRegistry::default()), Duration::from_secs(2));
        aggregator.register_probe(ResourceKind::Queue, Arc::new(HangingProbe));
        aggregator.register_resource(ResourceRef::new(ResourceKind::Queue, "redis").unwrap());

        let report = aggregator.check_all(&[ResourceKind::Queue]).await;
        let result = &report.per_resource[&ResourceKind::Queue][0];
        assert!(!result.healthy);
        assert_eq!(result.error.as_deref(), Some("probe timed out after 2s"));
        assert_eq!(report.overall_status, OverallStatus::Unhealthy);
    }

    #[tokio::test]
    async fn no_enabled_kinds_is_healthy() {
        let report = aggregator(&["mysql"]).check_all(&[]).await;
        assert_eq!(report.summary.total, 0);
        assert_eq!(report.overall_status, OverallStatus::Healthy);
    }
}
