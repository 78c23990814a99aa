//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Operator alerts for exhausted executions and recovered resources.
//!
//! The [`Notifier`] decides whether and what to send; delivery is delegated to an
//! [`AlertDispatcher`]. Dispatch errors are logged and never reach the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sfo_common::{AlertChannel, NotificationsConfig, ResourceKind};
use sfo_logging::{sfo_debug, sfo_error, TARGET_NOTIFY};
use sfo_metrics::FailoverMetrics;

use crate::model::ResourceRef;
use crate::throttle::{ExpiringStore, NotificationThrottle};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Failure,
    Recovery,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Failure => "failure",
            AlertKind::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Info,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::High => "high",
            AlertSeverity::Info => "info",
        }
    }
}

/// Formatted alert handed to a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub resource_kind: Option<ResourceKind>,
    pub resource: Option<String>,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    pub fn failure(context: &FailureContext) -> Self {
        Self {
            kind: AlertKind::Failure,
            title: "Service Failure Detected".to_owned(),
            description: format!(
                "A service failure has been detected:\n\nError: {}\nResource: {}\nKind: {}\nAttempts: {}",
                context.error,
                context.resource.name(),
                context.resource.kind(),
                context.attempts
            ),
            resource_kind: Some(context.resource.kind()),
            resource: Some(context.resource.name().to_owned()),
            severity: AlertSeverity::High,
            timestamp: Utc::now(),
        }
    }

    pub fn recovery(resource: &ResourceRef, detail: &str) -> Self {
        let mut description = format!(
            "Service has recovered and is now operational:\n\nService: {}",
            resource
        );
        if !detail.is_empty() {
            description.push_str("\nDetails: ");
            description.push_str(detail);
        }
        Self {
            kind: AlertKind::Recovery,
            title: "Service Recovery".to_owned(),
            description,
            resource_kind: Some(resource.kind()),
            resource: Some(resource.name().to_owned()),
            severity: AlertSeverity::Info,
            timestamp: Utc::now(),
        }
    }
}

/// Delivers alerts to operator channels.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send(&self, message: &AlertMessage, channels: &[AlertChannel]) -> anyhow::Result<()>;
}

/// Emits alerts as structured log events on the `sfo::notify` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

#[async_trait]
impl AlertDispatcher for TracingDispatcher {
    async fn send(&self, message: &AlertMessage, channels: &[AlertChannel]) -> anyhow::Result<()> {
        let channels = channels
            .iter()
            .map(AlertChannel::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let resource_kind = message.resource_kind.map(|kind| kind.as_str()).unwrap_or("");
        let resource = message.resource.as_deref().unwrap_or("");
        match message.severity {
            AlertSeverity::High => tracing::warn!(
                target: "sfo::notify",
                alert = message.kind.as_str(),
                severity = message.severity.as_str(),
                channels = %channels,
                kind = resource_kind,
                resource,
                description = %message.description,
                "{}",
                message.title
            ),
            AlertSeverity::Info => tracing::info!(
                target: "sfo::notify",
                alert = message.kind.as_str(),
                severity = message.severity.as_str(),
                channels = %channels,
                kind = resource_kind,
                resource,
                description = %message.description,
                "{}",
                message.title
            ),
        }
        Ok(())
    }
}

/// What went wrong when every resource was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub resource: ResourceRef,
    pub error: String,
    pub attempts: u32,
}

impl FailureContext {
    pub fn new(resource: ResourceRef, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            resource,
            error: error.into(),
            attempts,
        }
    }

    /// Throttle signature: the error message plus where it came from.
    pub fn signature(&self) -> String {
        format!("{}|{}", self.error, self.resource)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Disabled,
    Throttled,
    Sent,
    DispatchFailed,
}

impl NotifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOutcome::Disabled => "disabled",
            NotifyOutcome::Throttled => "throttled",
            NotifyOutcome::Sent => "sent",
            NotifyOutcome::DispatchFailed => "dispatch_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierSettings {
    pub enabled: bool,
    pub channels: Vec<AlertChannel>,
    pub throttle_enabled: bool,
    pub window: Duration,
}

impl From<&NotificationsConfig> for NotifierSettings {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            channels: config.channels.clone(),
            throttle_enabled: config.throttle.enabled,
            window: config.throttle.window,
        }
    }
}

pub struct Notifier {
    settings: NotifierSettings,
    throttle: NotificationThrottle,
    dispatcher: Arc<dyn AlertDispatcher>,
    metrics: Option<FailoverMetrics>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(
        settings: NotifierSettings,
        store: Arc<dyn ExpiringStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self {
            settings,
            throttle: NotificationThrottle::new(store),
            dispatcher,
            metrics: None,
        }
    }

    pub fn from_config(
        config: &NotificationsConfig,
        store: Arc<dyn ExpiringStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self::new(NotifierSettings::from(config), store, dispatcher)
    }

    pub fn with_metrics(mut self, metrics: FailoverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &NotifierSettings {
        &self.settings
    }

    pub fn throttle(&self) -> &NotificationThrottle {
        &self.throttle
    }

    pub async fn notify_failure(&self, context: &FailureContext) -> NotifyOutcome {
        let outcome = if !self.settings.enabled {
            NotifyOutcome::Disabled
        } else if self.settings.throttle_enabled
            && !self
                .throttle
                .maybe_notify(&context.signature(), self.settings.window)
                .await
        {
            NotifyOutcome::Throttled
        } else {
            self.dispatch(&AlertMessage::failure(context)).await
        };
        self.observe(AlertKind::Failure, outcome);
        outcome
    }

    /// Recovery alerts are never throttled.
    pub async fn notify_recovery(&self, resource: &ResourceRef, detail: &str) -> NotifyOutcome {
        let outcome = if self.settings.enabled {
            self.dispatch(&AlertMessage::recovery(resource, detail)).await
        } else {
            NotifyOutcome::Disabled
        };
        self.observe(AlertKind::Recovery, outcome);
        outcome
    }

    async fn dispatch(&self, message: &AlertMessage) -> NotifyOutcome {
        match self.dispatcher.send(message, &self.settings.channels).await {
            Ok(()) => NotifyOutcome::Sent,
            Err(err) => {
                sfo_error!(
                    target: TARGET_NOTIFY,
                    "failed to dispatch {} alert: {:#}",
                    message.kind.as_str(),
                    err
                );
                NotifyOutcome::DispatchFailed
            }
        }
    }

    fn observe(&self, kind: AlertKind, outcome: NotifyOutcome) {
        sfo_debug!(
            target: TARGET_NOTIFY,
            "{} notification outcome: {}",
            kind.as_str(),
            outcome.as_str()
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_notification(kind.as_str(), outcome.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::InMemoryExpiringStore;
    use anyhow::anyhow;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<AlertMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertDispatcher for RecordingDispatcher {
        async fn send(&self, message: &AlertMessage, _channels: &[AlertChannel]) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("webhook returned 500"));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    fn settings(enabled: bool, throttle_enabled: bool) -> NotifierSettings {
        NotifierSettings {
            enabled,
            channels: vec![AlertChannel::Log],
            throttle_enabled,
            window: Duration::from_secs(900),
        }
    }

    fn context() -> FailureContext {
        let resource = ResourceRef::new(ResourceKind::Database, "backup").unwrap();
        FailureContext::new(resource, "connection refused", 3)
    }

    #[tokio::test]
    async fn failures_are_throttled_per_signature() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Notifier::new(
            settings(true, true),
            Arc::new(InMemoryExpiringStore::new()),
            dispatcher.clone(),
        );
        assert_eq!(notifier.notify_failure(&context()).await, NotifyOutcome::Sent);
        assert_eq!(notifier.notify_failure(&context()).await, NotifyOutcome::Throttled);

        let sent = dispatcher.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Service Failure Detected");
        assert_eq!(sent[0].severity, AlertSeverity::High);
        assert!(sent[0].description.contains("Error: connection refused"));
        assert_eq!(sent[0].resource.as_deref(), Some("backup"));
    }

    #[tokio::test]
    async fn disabled_throttle_sends_every_failure() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Notifier::new(
            settings(true, false),
            Arc::new(InMemoryExpiringStore::new()),
            dispatcher.clone(),
        );
        for _ in 0..3 {
            assert_eq!(notifier.notify_failure(&context()).await, NotifyOutcome::Sent);
        }
        assert_eq!(dispatcher.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Notifier::new(
            settings(false, true),
            Arc::new(InMemoryExpiringStore::new()),
            dispatcher.clone(),
        );
        assert_eq!(notifier.notify_failure(&context()).await, NotifyOutcome::Disabled);
        assert_eq!(
            notifier.notify_recovery(&context().resource, "").await,
            NotifyOutcome::Disabled
        );
        assert!(dispatcher.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn recovery_bypasses_throttle_and_dispatch_errors_are_swallowed() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Notifier::new(
            settings(true, true),
            Arc::new(InMemoryExpiringStore::new()),
            dispatcher.clone(),
        );
        let resource = context().resource;
        for _ in 0..2 {
            assert_eq!(
                notifier.notify_recovery(&resource, "probe ok in 3ms").await,
                NotifyOutcome::Sent
            );
        }
        let sent = dispatcher.sent.lock().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].title, "Service Recovery");
        assert!(sent[0].description.contains("Details: probe ok in 3ms"));

        let failing = Notifier::new(
            settings(true, true),
            Arc::new(InMemoryExpiringStore::new()),
            Arc::new(RecordingDispatcher {
                fail: true,
                ..Default::default()
            }),
        );
        assert_eq!(
            failing.notify_failure(&context()).await,
            NotifyOutcome::DispatchFailed
        );
    }

    #[tokio::test]
    async fn tracing_dispatcher_accepts_alerts() {
        let message = AlertMessage::failure(&context());
        TracingDispatcher
            .send(&message, &[AlertChannel::Log, AlertChannel::Slack])
            .await
            .unwrap();
    }
}
