//! ---
//! sfo_section: "03-observability"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Metrics collection and export utilities."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

use crate::SharedRegistry;

/// Prometheus instruments for attempts, fallbacks, probes and alerts.
#[derive(Clone)]
pub struct FailoverMetrics {
    registry: SharedRegistry,
    attempts: IntCounterVec,
    fallbacks: IntCounterVec,
    exhaustions: IntCounterVec,
    probes: IntCounterVec,
    notifications: IntCounterVec,
    attempt_latency: HistogramVec,
    probe_latency: HistogramVec,
    overall_status: IntGauge,
}

impl fmt::Debug for FailoverMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverMetrics").finish_non_exhaustive()
    }
}

impl FailoverMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let attempts = IntCounterVec::new(
            Opts::new(
                "sfo_attempts_total",
                "Operation attempts by resource, role and outcome",
            ),
            &["kind", "resource", "role", "outcome"],
        )?;
        registry.register(Box::new(attempts.clone()))?;

        let fallbacks = IntCounterVec::new(
            Opts::new(
                "sfo_fallbacks_total",
                "Times execution moved from the first resource to the second",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(fallbacks.clone()))?;

        let exhaustions = IntCounterVec::new(
            Opts::new(
                "sfo_exhaustions_total",
                "Executions that exhausted every resource",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(exhaustions.clone()))?;

        let probes = IntCounterVec::new(
            Opts::new("sfo_probes_total", "Health probe results by resource"),
            &["kind", "resource", "status"],
        )?;
        registry.register(Box::new(probes.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new(
                "sfo_notifications_total",
                "Alert notifications by type and outcome",
            ),
            &["type", "outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 15)
            .context("failed to construct latency buckets")?;
        let attempt_latency = HistogramVec::new(
            HistogramOpts::new(
                "sfo_attempt_latency_seconds",
                "Latency of individual operation attempts",
            )
            .buckets(buckets.clone()),
            &["kind", "resource"],
        )?;
        registry.register(Box::new(attempt_latency.clone()))?;

        let probe_latency = HistogramVec::new(
            HistogramOpts::new(
                "sfo_probe_latency_seconds",
                "Round trip latency of health probes",
            )
            .buckets(buckets),
            &["kind"],
        )?;
        registry.register(Box::new(probe_latency.clone()))?;

        let overall_status = IntGauge::with_opts(Opts::new(
            "sfo_overall_status",
            "Last aggregated status (0 healthy, 1 degraded, 2 unhealthy)",
        ))?;
        registry.register(Box::new(overall_status.clone()))?;

        Ok(Self {
            registry,
            attempts,
            fallbacks,
            exhaustions,
            probes,
            notifications,
            attempt_latency,
            probe_latency,
            overall_status,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count one attempt and observe its latency.
    pub fn record_attempt(
        &self,
        kind: &str,
        resource: &str,
        role: &str,
        outcome: &str,
        elapsed: Duration,
    ) {
        self.attempts
            .with_label_values(&[kind, resource, role, outcome])
            .inc();
        self.attempt_latency
            .with_label_values(&[kind, resource])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_fallback(&self, kind: &str) {
        self.fallbacks.with_label_values(&[kind]).inc();
    }

    /// `outcome` is `degraded` or `failed`.
    pub fn record_exhaustion(&self, kind: &str, outcome: &str) {
        self.exhaustions.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_probe(&self, kind: &str, resource: &str, healthy: bool, elapsed: Duration) {
        let status = if healthy { "healthy" } else { "unhealthy" };
        self.probes
            .with_label_values(&[kind, resource, status])
            .inc();
        self.probe_latency
            .with_label_values(&[kind])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_notification(&self, notification_type: &str, outcome: &str) {
        self.notifications
            .with_label_values(&[notification_type, outcome])
            .inc();
    }

    pub fn set_overall_status(&self, code: i64) {
        self.overall_status.set(code);
    }
}
