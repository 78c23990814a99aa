//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! In-memory health registry shared by the executor and the aggregator.
//!
//! Writes are per-entry atomic; there is no lock spanning several resources and
//! every read hands out an owned clone, so callers never hold a guard across an
//! `.await`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sfo_common::ResourceKind;

use crate::model::{HealthRecord, HealthStatus, HealthTransition, ProbeResult, ResourceRef};

/// Time an unhealthy resource is avoided before it is optimistically retried.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
pub struct HealthRegistry {
    records: DashMap<ResourceRef, HealthRecord>,
    cooldown: Duration,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl HealthRegistry {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            records: DashMap::new(),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Current record, created as `Unknown` on first reference.
    pub fn get(&self, resource: &ResourceRef) -> HealthRecord {
        self.records
            .entry(resource.clone())
            .or_insert_with(|| HealthRecord::unknown(resource.clone(), Utc::now()))
            .value()
            .clone()
    }

    pub fn record_success(&self, resource: &ResourceRef, response_time_ms: f64) -> HealthTransition {
        self.record_success_at(resource, response_time_ms, Utc::now())
    }

    pub fn record_success_at(
        &self,
        resource: &ResourceRef,
        response_time_ms: f64,
        now: DateTime<Utc>,
    ) -> HealthTransition {
        self.update(resource, now, |record| {
            record.status = HealthStatus::Healthy;
            record.response_time_ms = Some(response_time_ms);
            record.last_error = None;
        })
    }

    /// Mark the resource unhealthy and start its cooldown.
    pub fn record_failure(&self, resource: &ResourceRef, error: impl Into<String>) -> HealthTransition {
        self.record_failure_at(resource, error, Utc::now())
    }

    pub fn record_failure_at(
        &self,
        resource: &ResourceRef,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> HealthTransition {
        let error = error.into();
        self.update(resource, now, |record| {
            record.status = HealthStatus::Unhealthy;
            record.last_error = Some(error);
            record.last_failure_at = Some(now);
        })
    }

    /// Note a failed attempt without changing the status.
    pub fn record_attempt_failure(
        &self,
        resource: &ResourceRef,
        error: impl Into<String>,
    ) -> HealthTransition {
        self.record_attempt_failure_at(resource, error, Utc::now())
    }

    pub fn record_attempt_failure_at(
        &self,
        resource: &ResourceRef,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> HealthTransition {
        let error = error.into();
        self.update(resource, now, |record| {
            record.last_error = Some(error);
        })
    }

    pub fn record_probe(&self, result: &ProbeResult) -> HealthTransition {
        let now = result.checked_at;
        match &result.error {
            None if result.healthy => {
                self.record_success_at(&result.resource, result.response_time_ms, now)
            }
            error => {
                let error = error.clone().unwrap_or_else(|| "probe reported unhealthy".to_owned());
                let response_time_ms = result.response_time_ms;
                self.update(&result.resource, now, |record| {
                    record.status = HealthStatus::Unhealthy;
                    record.last_error = Some(error);
                    record.last_failure_at = Some(now);
                    record.response_time_ms = Some(response_time_ms);
                })
            }
        }
    }

    /// Records of one kind sorted by name.
    pub fn get_all(&self, kind: ResourceKind) -> Vec<HealthRecord> {
        let mut records: Vec<HealthRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().kind() == kind)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.resource.name().cmp(b.resource.name()));
        records
    }

    /// Every record, ordered by kind then name.
    pub fn snapshot(&self) -> Vec<HealthRecord> {
        let mut records: Vec<HealthRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.resource.cmp(&b.resource));
        records
    }

    /// True when at least one resource of `kind` is currently `Healthy`.
    pub fn any_healthy(&self, kind: ResourceKind) -> bool {
        self.records.iter().any(|entry| {
            entry.key().kind() == kind && entry.value().status == HealthStatus::Healthy
        })
    }

    pub fn is_healthy(&self, resource: &ResourceRef) -> bool {
        self.is_healthy_at(resource, Utc::now())
    }

    /// Healthy and never-observed resources are usable; unhealthy ones become usable
    /// again once the cooldown has elapsed since their last failure.
    pub fn is_healthy_at(&self, resource: &ResourceRef, now: DateTime<Utc>) -> bool {
        let Some(record) = self.records.get(resource).map(|entry| entry.value().clone()) else {
            return true;
        };
        match record.status {
            HealthStatus::Healthy | HealthStatus::Unknown => true,
            HealthStatus::Unhealthy => record
                .last_failure_at
                .and_then(|failed_at| now.signed_duration_since(failed_at).to_std().ok())
                .map_or(false, |elapsed| elapsed >= self.cooldown),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update<F>(&self, resource: &ResourceRef, now: DateTime<Utc>, apply: F) -> HealthTransition
    where
        F: FnOnce(&mut HealthRecord),
    {
        let mut entry = self
            .records
            .entry(resource.clone())
            .or_insert_with(|| HealthRecord::unknown(resource.clone(), now));
        let previous = entry.status;
        entry.last_checked_at = now;
        apply(entry.value_mut());
        HealthTransition {
            previous,
            current: entry.status,
        }
    }
}
