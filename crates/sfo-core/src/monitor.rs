//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indexmap::IndexMap;
use sfo_common::ResourceKind;
use sfo_logging::{log_system_event, SystemEventOutcome};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::aggregator::HealthAggregator;
use crate::model::{AggregateReport, OverallStatus, ProbeResult};

const MIN_PERIOD: Duration = Duration::from_millis(1);
const IDLE_PERIOD: Duration = Duration::from_secs(3600);

/// Background task running health sweeps, each kind on its own cadence.
#[derive(Debug)]
pub struct HealthMonitor {
    latest: watch::Receiver<Option<AggregateReport>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Sweep every kind immediately and then every `interval`.
    pub fn spawn(
        aggregator: Arc<HealthAggregator>,
        kinds: Vec<ResourceKind>,
        interval: Duration,
    ) -> Self {
        let schedule = kinds.into_iter().map(|kind| (kind, interval)).collect();
        Self::spawn_with_schedule(aggregator, schedule)
    }

    /// Sweep every kind immediately and then each one after its own period.
    /// Kinds falling due together are probed in one sweep; the published report
    /// always holds the latest results of every scheduled kind.
    pub fn spawn_with_schedule(
        aggregator: Arc<HealthAggregator>,
        schedule: IndexMap<ResourceKind, Duration>,
    ) -> Self {
        let (report_tx, report_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let schedule: IndexMap<ResourceKind, Duration> = schedule
            .into_iter()
            .map(|(kind, period)| (kind, period.max(MIN_PERIOD)))
            .collect();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut due: IndexMap<ResourceKind, Instant> =
                schedule.keys().map(|kind| (*kind, started)).collect();
            let mut results: IndexMap<ResourceKind, Vec<ProbeResult>> = IndexMap::new();
            let mut last_status: Option<OverallStatus> = None;
            loop {
                let next = due
                    .values()
                    .min()
                    .copied()
                    .unwrap_or_else(|| Instant::now() + IDLE_PERIOD);
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = sleep_until(next) => {
                        let now = Instant::now();
                        let kinds: Vec<ResourceKind> = due
                            .iter()
                            .filter(|(_, at)| **at <= now)
                            .map(|(kind, _)| *kind)
                            .collect();
                        if kinds.is_empty() {
                            continue;
                        }

                        let sweep = aggregator.check_all(&kinds).await;
                        let finished = Instant::now();
                        for kind in &kinds {
                            if let Some(period) = schedule.get(kind) {
                                due.insert(*kind, finished + *period);
                            }
                        }
                        results.extend(sweep.per_resource);
                        results.sort_keys();

                        let mut report = AggregateReport::from_results(results.clone());
                        report.generated_at = sweep.generated_at;
                        aggregator.publish_status(&report);

                        let status = report.overall_status;
                        if last_status != Some(status) {
                            let outcome = match status {
                                OverallStatus::Healthy => SystemEventOutcome::Success,
                                OverallStatus::Degraded => SystemEventOutcome::Degraded,
                                OverallStatus::Unhealthy => SystemEventOutcome::Fault,
                            };
                            log_system_event(
                                None,
                                "health.status_changed",
                                &format!(
                                    "overall status {} ({}/{} healthy)",
                                    status, report.summary.healthy, report.summary.total
                                ),
                                outcome,
                            );
                            last_status = Some(status);
                        }
                        report_tx.send_replace(Some(report));
                    }
                }
            }
        });

        Self {
            latest: report_rx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Most recent report, if a sweep has completed.
    pub fn latest(&self) -> Option<AggregateReport> {
        self.latest.borrow().clone()
    }

    /// Receiver notified after every sweep.
    pub fn subscribe(&self) -> watch::Receiver<Option<AggregateReport>> {
        self.latest.clone()
    }

    /// Signal shutdown and await the task.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.map_err(anyhow::Error::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FailoverSet, ResourceRef};
    use crate::probe::HealthProbe;
    use crate::registry::HealthRegistry;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct ToggleProbe {
        healthy: AtomicBool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl HealthProbe for ToggleProbe {
        async fn round_trip(&self, _resource: &ResourceRef) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(anyhow!("down"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_and_publishes_latest() {
        let probe = Arc::new(ToggleProbe {
            healthy: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        });
        let mut aggregator =
            HealthAggregator::new(Arc::new(HealthRegistry::default()), Duration::from_secs(1));
        aggregator.register_probe(ResourceKind::Cache, probe.clone());
        aggregator.register_set(&FailoverSet::from_names(ResourceKind::Cache, "redis", None).unwrap());

        let monitor = HealthMonitor::spawn(
            Arc::new(aggregator),
            vec![ResourceKind::Cache],
            Duration::from_secs(30),
        );
        let mut updates = monitor.subscribe();

        updates.changed().await.unwrap();
        assert_eq!(
            monitor.latest().map(|report| report.overall_status),
            Some(OverallStatus::Unhealthy)
        );

        probe.healthy.store(true, Ordering::SeqCst);
        updates.changed().await.unwrap();
        assert_eq!(
            monitor.latest().map(|report| report.overall_status),
            Some(OverallStatus::Healthy)
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

        monitor.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn each_kind_sweeps_on_its_own_period() {
        let cache = Arc::new(ToggleProbe {
            healthy: AtomicBool::new(true),
            calls: AtomicU32::new(0),
        });
        let queue = Arc::new(ToggleProbe {
            healthy: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        });
        let mut aggregator =
            HealthAggregator::new(Arc::new(HealthRegistry::default()), Duration::from_secs(1));
        aggregator.register_probe(ResourceKind::Cache, cache.clone());
        aggregator.register_probe(ResourceKind::Queue, queue.clone());
        aggregator.register_resource(ResourceRef::new(ResourceKind::Cache, "redis").unwrap());
        aggregator.register_resource(ResourceRef::new(ResourceKind::Queue, "broker").unwrap());

        let mut schedule = IndexMap::new();
        schedule.insert(ResourceKind::Queue, Duration::from_secs(60));
        schedule.insert(ResourceKind::Cache, Duration::from_secs(10));
        let monitor = HealthMonitor::spawn_with_schedule(Arc::new(aggregator), schedule);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(cache.calls.load(Ordering::SeqCst), 7);
        assert_eq!(queue.calls.load(Ordering::SeqCst), 2);

        let report = monitor.latest().unwrap();
        assert_eq!(
            report.per_resource.keys().copied().collect::<Vec<_>>(),
            vec![ResourceKind::Cache, ResourceKind::Queue]
        );
        assert_eq!(report.overall_status, OverallStatus::Degraded);
        assert_eq!(report.summary.total, 2);

        monitor.shutdown().await.unwrap();
    }
}
