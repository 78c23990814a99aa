//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Retry and fallback state machine.
//!
//! Each resource of a [`FailoverSet`] gets its own retry loop driven by a
//! [`RetryPolicy`]. Attempts are recorded in the [`HealthRegistry`], exhaustion of
//! every resource is reported through the optional [`Notifier`], and the caller
//! receives a value, a degraded outcome or exactly one error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sfo_common::time::{duration_to_millis, human_duration};
use sfo_common::{FailoverSettings, ResourceKind};
use sfo_logging::{
    log_system_event, sfo_debug, sfo_error, sfo_info, sfo_warn, LogContext, SystemEventOutcome,
    TARGET_EXECUTOR,
};
use sfo_metrics::FailoverMetrics;
use tokio::time::{sleep, Instant};

use crate::capability::ResourceCapability;
use crate::error::{FailoverError, OperationError};
use crate::model::{FailoverSet, ResourceRef, ResourceRole};
use crate::notify::{FailureContext, Notifier};
use crate::registry::HealthRegistry;
use crate::retry::RetryPolicy;
use crate::routes::FailoverRoutes;

/// Behaviour of one execution beyond the per-resource retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    pub retry: RetryPolicy,
    /// Return [`Execution::Degraded`] instead of an error once every resource is exhausted.
    pub graceful_degradation: bool,
    /// Try a healthy fallback before a primary that is inside its cooldown.
    pub prefer_healthy: bool,
}

impl FailoverPolicy {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            graceful_degradation: false,
            prefer_healthy: false,
        }
    }

    pub fn with_graceful_degradation(mut self, enabled: bool) -> Self {
        self.graceful_degradation = enabled;
        self
    }

    pub fn with_prefer_healthy(mut self, enabled: bool) -> Self {
        self.prefer_healthy = enabled;
        self
    }
}

impl From<&FailoverSettings> for FailoverPolicy {
    fn from(settings: &FailoverSettings) -> Self {
        Self::new(RetryPolicy::from(settings))
            .with_graceful_degradation(settings.graceful_degradation)
            .with_prefer_healthy(settings.prefer_healthy)
    }
}

/// Terminal outcome of an execution that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution<T> {
    Completed {
        value: T,
        served_by: ResourceRef,
        role: ResourceRole,
        attempts: u32,
    },
    Degraded {
        kind: ResourceKind,
        last_error: String,
    },
}

impl<T> Execution<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Execution::Degraded { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Execution::Completed { value, .. } => Some(value),
            Execution::Degraded { .. } => None,
        }
    }

    pub fn served_by(&self) -> Option<&ResourceRef> {
        match self {
            Execution::Completed { served_by, .. } => Some(served_by),
            Execution::Degraded { .. } => None,
        }
    }

    /// The produced value, or `neutral` when degraded.
    pub fn into_value_or(self, neutral: T) -> T {
        match self {
            Execution::Completed { value, .. } => value,
            Execution::Degraded { .. } => neutral,
        }
    }

    pub fn into_value_or_default(self) -> T
    where
        T: Default,
    {
        self.into_value_or(T::default())
    }
}

enum ResourceOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, error: anyhow::Error },
    Fatal(anyhow::Error),
}

/// Runs operations against a failover set.
pub struct FailoverExecutor<C> {
    capability: C,
    registry: Arc<HealthRegistry>,
    notifier: Option<Arc<Notifier>>,
    metrics: Option<FailoverMetrics>,
}

impl<C> std::fmt::Debug for FailoverExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverExecutor")
            .field("notifier", &self.notifier.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: ResourceCapability> FailoverExecutor<C> {
    pub fn new(capability: C, registry: Arc<HealthRegistry>) -> Self {
        Self {
            capability,
            registry,
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

    /// Run `operation` against the set, retrying and falling back per `policy`.
    pub async fn execute<T, F, Fut>(
        &self,
        set: &FailoverSet,
        policy: &FailoverPolicy,
        mut operation: F,
    ) -> Result<Execution<T>, FailoverError>
    where
        F: FnMut(C::Handle) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let plan = self.plan(set, policy);
        let mut last_failure: Option<(ResourceRef, u32, anyhow::Error)> = None;

        for (index, (role, resource)) in plan.into_iter().enumerate() {
            if index > 0 {
                sfo_warn!(
                    target: TARGET_EXECUTOR,
                    context = LogContext::new()
                        .with_kind(resource.kind().as_str())
                        .with_resource(resource.name())
                        .with_role(role.as_str()),
                    "switching to {} after exhausting previous resource",
                    resource
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_fallback(resource.kind().as_str());
                }
            }

            match self
                .run_resource(resource, role, &policy.retry, &mut operation)
                .await
            {
                ResourceOutcome::Succeeded { value, attempts } => {
                    return Ok(Execution::Completed {
                        value,
                        served_by: resource.clone(),
                        role,
                        attempts,
                    });
                }
                ResourceOutcome::Fatal(error) => {
                    return Err(FailoverError::Fatal {
                        resource: resource.clone(),
                        source: error,
                    });
                }
                ResourceOutcome::Exhausted { attempts, error } => {
                    last_failure = Some((resource.clone(), attempts, error));
                }
            }
        }

        let Some((resource, attempts, error)) = last_failure else {
            return Err(FailoverError::Configuration(format!(
                "failover set for {} has no resources",
                set.kind()
            )));
        };
        self.exhausted(set.kind(), policy, resource, attempts, error)
            .await
    }

    /// Like [`FailoverExecutor::execute`], returning `T::default()` when degraded.
    pub async fn execute_or_default<T, F, Fut>(
        &self,
        set: &FailoverSet,
        policy: &FailoverPolicy,
        operation: F,
    ) -> Result<T, FailoverError>
    where
        T: Default,
        F: FnMut(C::Handle) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        Ok(self
            .execute(set, policy, operation)
            .await?
            .into_value_or_default())
    }

    /// Resolve the configured route for `kind` and execute against it.
    pub async fn execute_route<T, F, Fut>(
        &self,
        routes: &FailoverRoutes,
        kind: ResourceKind,
        operation: F,
    ) -> Result<Execution<T>, FailoverError>
    where
        F: FnMut(C::Handle) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let route = routes.route(kind)?;
        self.execute(&route.set, &route.policy, operation).await
    }

    fn plan<'a>(
        &self,
        set: &'a FailoverSet,
        policy: &FailoverPolicy,
    ) -> Vec<(ResourceRole, &'a ResourceRef)> {
        let mut plan: Vec<_> = set.members().collect();
        if policy.prefer_healthy {
            if let Some(fallback) = set.fallback() {
                if !self.registry.is_healthy(set.primary()) && self.registry.is_healthy(fallback) {
                    sfo_info!(
                        target: TARGET_EXECUTOR,
                        "{} is cooling down; trying {} first",
                        set.primary(),
                        fallback
                    );
                    plan.reverse();
                }
            }
        }
        plan
    }

    async fn run_resource<T, F, Fut>(
        &self,
        resource: &ResourceRef,
        role: ResourceRole,
        retry: &RetryPolicy,
        operation: &mut F,
    ) -> ResourceOutcome<T>
    where
        F: FnMut(C::Handle) -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let kind = resource.kind().as_str();
        let mut attempt: u32 = 1;
        loop {
            let ctx = LogContext::new()
                .with_kind(kind)
                .with_resource(resource.name())
                .with_role(role.as_str())
                .with_attempt(attempt);

            let started = Instant::now();
            let result = match self.capability.resolve(resource).await {
                Ok(handle) => operation(handle).await,
                Err(err) => Err(OperationError::Retryable(
                    err.context(format!("failed to resolve {}", resource)),
                )),
            };
            let elapsed = started.elapsed();

            match result {
                Ok(value) => {
                    self.registry
                        .record_success(resource, duration_to_millis(elapsed));
                    self.observe_attempt(resource, role, "success", elapsed);
                    sfo_debug!(
                        target: TARGET_EXECUTOR,
                        context = ctx,
                        "attempt succeeded in {}",
                        human_duration(elapsed)
                    );
                    return ResourceOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(OperationError::Fatal(error)) => {
                    self.observe_attempt(resource, role, "fatal", elapsed);
                    sfo_error!(
                        target: TARGET_EXECUTOR,
                        context = ctx,
                        "non-retryable failure: {:#}",
                        error
                    );
                    return ResourceOutcome::Fatal(error);
                }
                Err(OperationError::Retryable(error)) => {
                    self.observe_attempt(resource, role, "failure", elapsed);
                    let message = format!("{:#}", error);
                    let next = attempt.saturating_add(1);
                    if retry.should_retry(next) {
                        self.registry.record_attempt_failure(resource, message.as_str());
                        let delay = retry.delay_for(next);
                        sfo_warn!(
                            target: TARGET_EXECUTOR,
                            context = ctx,
                            "attempt failed, retrying in {}: {}",
                            human_duration(delay),
                            message
                        );
                        sleep(delay).await;
                        attempt = next;
                    } else {
                        self.registry.record_failure(resource, message.as_str());
                        sfo_error!(
                            target: TARGET_EXECUTOR,
                            context = ctx,
                            "giving up after {} attempts: {}",
                            attempt,
                            message
                        );
                        return ResourceOutcome::Exhausted {
                            attempts: attempt,
                            error,
                        };
                    }
                }
            }
        }
    }

    async fn exhausted<T>(
        &self,
        kind: ResourceKind,
        policy: &FailoverPolicy,
        resource: ResourceRef,
        attempts: u32,
        error: anyhow::Error,
    ) -> Result<Execution<T>, FailoverError> {
        let last_error = format!("{:#}", error);
        if let Some(notifier) = &self.notifier {
            let context = FailureContext::new(resource.clone(), last_error.as_str(), attempts);
            notifier.notify_failure(&context).await;
        }

        let ctx = LogContext::new()
            .with_kind(kind.as_str())
            .with_resource(resource.name())
            .with_attempt(attempts);
        if policy.graceful_degradation {
            log_system_event(
                Some(&ctx),
                "failover.degraded",
                &format!("all {} resources exhausted; degrading: {}", kind, last_error),
                SystemEventOutcome::Degraded,
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_exhaustion(kind.as_str(), "degraded");
            }
            Ok(Execution::Degraded { kind, last_error })
        } else {
            log_system_event(
                Some(&ctx),
                "failover.exhausted",
                &format!("all {} resources exhausted: {}", kind, last_error),
                SystemEventOutcome::Fault,
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_exhaustion(kind.as_str(), "failed");
            }
            Err(FailoverError::Exhausted {
                kind,
                resource,
                attempts,
                source: error,
            })
        }
    }

    fn observe_attempt(
        &self,
        resource: &ResourceRef,
        role: ResourceRole,
        outcome: &str,
        elapsed: Duration,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(
                resource.kind().as_str(),
                resource.name(),
                role.as_str(),
                outcome,
                elapsed,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PassthroughCapability;
    use crate::model::HealthStatus;
    use anyhow::anyhow;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn set(fallback: Option<&str>) -> FailoverSet {
        FailoverSet::from_names(ResourceKind::Database, "mysql", fallback).unwrap()
    }

    fn executor() -> FailoverExecutor<PassthroughCapability> {
        FailoverExecutor::new(PassthroughCapability, Arc::new(HealthRegistry::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn primary_success_never_touches_fallback() {
        let executor = executor();
        let policy = FailoverPolicy::new(RetryPolicy::constant(3, Duration::from_millis(10)));
        let calls = AtomicU32::new(0);

        let execution = executor
            .execute(&set(Some("backup")), &policy, |resource: ResourceRef| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    assert_eq!(resource.name(), "mysql");
                    if call < 2 {
                        Err(OperationError::retryable(anyhow!("deadlock")))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(
            execution,
            Execution::Completed {
                value: 2,
                served_by: ResourceRef::new(ResourceKind::Database, "mysql").unwrap(),
                role: ResourceRole::Primary,
                attempts: 2,
            }
        );
        let registry = executor.registry();
        let primary = registry.get(set(None).primary());
        assert_eq!(primary.status, HealthStatus::Healthy);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_stop_immediately() {
        let executor = executor();
        let policy = FailoverPolicy::new(RetryPolicy::constant(5, Duration::from_millis(10)))
            .with_graceful_degradation(true);
        let calls = AtomicU32::new(0);

        let err = executor
            .execute(&set(Some("backup")), &policy, |_resource: ResourceRef| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(OperationError::fatal(anyhow!("duplicate key"))) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FailoverError::Fatal { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(executor.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn primary_only_set_exhausts_and_propagates() {
        let executor = executor();
        let policy = FailoverPolicy::new(RetryPolicy::constant(2, Duration::from_millis(5)));

        let err = executor
            .execute(&set(None), &policy, |_resource: ResourceRef| async {
                Err::<(), _>(OperationError::retryable(anyhow!("refused")))
            })
            .await
            .unwrap_err();

        match err {
            FailoverError::Exhausted {
                resource, attempts, ..
            } => {
                assert_eq!(resource.name(), "mysql");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn prefer_healthy_tries_fallback_first_during_cooldown() {
        let executor = executor();
        let failover = set(Some("backup"));
        executor
            .registry()
            .record_failure_at(failover.primary(), "down", Utc::now());

        let policy = FailoverPolicy::new(RetryPolicy::constant(1, Duration::ZERO))
            .with_prefer_healthy(true);
        let execution = executor
            .execute(&failover, &policy, |resource: ResourceRef| async move {
                Ok::<_, OperationError>(resource.name().to_owned())
            })
            .await
            .unwrap();
        assert_eq!(execution.value().map(String::as_str), Some("backup"));

        let default_order = FailoverPolicy::new(RetryPolicy::constant(1, Duration::ZERO));
        let execution = executor
            .execute(&failover, &default_order, |resource: ResourceRef| async move {
                Ok::<_, OperationError>(resource.name().to_owned())
            })
            .await
            .unwrap();
        assert_eq!(execution.value().map(String::as_str), Some("mysql"));
    }

    #[tokio::test]
    async fn unrouted_kind_fails_before_any_attempt() {
        let executor = executor();
        let calls = AtomicU32::new(0);

        let err = executor
            .execute_route(&FailoverRoutes::new(), ResourceKind::Mail, |_resource: ResourceRef| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, OperationError>(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(err.resource().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(executor.registry().is_empty());
    }

    #[tokio::test]
    async fn execute_or_default_yields_neutral_value() {
        let executor = executor();
        let policy = FailoverPolicy::new(RetryPolicy::constant(1, Duration::ZERO))
            .with_graceful_degradation(true);
        let value: Vec<u8> = executor
            .execute_or_default(&set(Some("backup")), &policy, |_resource: ResourceRef| async {
                Err::<Vec<u8>, _>(OperationError::retryable(anyhow!("offline")))
            })
            .await
            .unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn execution_helpers() {
        let degraded: Execution<u32> = Execution::Degraded {
            kind: ResourceKind::Cache,
            last_error: "timeout".into(),
        };
        assert!(degraded.is_degraded());
        assert_eq!(degraded.clone().into_value_or(7), 7);
        assert_eq!(degraded.into_value_or_default(), 0);
    }
}
