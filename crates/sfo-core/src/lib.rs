//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Generic failover execution core.
//!
//! Runs caller operations against a primary resource, retries and falls back per
//! policy, tracks per-resource health, aggregates probe results into a system
//! status and throttles operator alerts. Talking to concrete databases, caches,
//! brokers, mail transports or volumes happens behind [`ResourceCapability`] and
//! [`HealthProbe`].

pub mod aggregator;
pub mod capability;
pub mod error;
pub mod executor;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod retry;
pub mod routes;
pub mod throttle;

pub use aggregator::HealthAggregator;
pub use capability::{PassthroughCapability, ResourceCapability};
pub use error::{FailoverError, OperationError};
pub use executor::{Execution, FailoverExecutor, FailoverPolicy};
pub use model::{
    AggregateReport, FailoverSet, HealthRecord, HealthStatus, HealthSummary, HealthTransition,
    OverallStatus, ProbeResult, ResourceRef, ResourceRole,
};
pub use monitor::HealthMonitor;
pub use notify::{
    AlertDispatcher, AlertKind, AlertMessage, AlertSeverity, FailureContext, Notifier,
    NotifierSettings, NotifyOutcome, TracingDispatcher,
};
pub use probe::{HealthProbe, SharedProbe};
pub use registry::{HealthRegistry, DEFAULT_COOLDOWN};
pub use retry::RetryPolicy;
pub use routes::{FailoverRoute, FailoverRoutes};
pub use throttle::{
    ExpiringStore, InMemoryExpiringStore, NotificationThrottle, ThrottleKey, ThrottleWindow,
};

/// Commonly used types for wiring the core into an application.
pub mod prelude {
    pub use super::{
        Execution, FailoverError, FailoverExecutor, FailoverPolicy, FailoverSet, HealthAggregator,
        HealthProbe, HealthRegistry, OperationError, ResourceCapability, ResourceRef,
        RetryPolicy,
    };
    pub use sfo_common::ResourceKind;
}
