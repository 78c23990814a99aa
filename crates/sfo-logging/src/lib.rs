//! ---
//! sfo_section: "03-observability"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Structured logging helpers for failover events."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Context-enriched logging for the failover runtime.
//!
//! Every event carries the same `kind`, `resource`, `role` and `attempt` fields so
//! that log pipelines can correlate attempts, fallbacks and probe results without
//! parsing free-form messages.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

#[macro_use]
pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Target used by the failover executor.
pub const TARGET_EXECUTOR: &str = "sfo::executor";
/// Target used by health probing and aggregation.
pub const TARGET_HEALTH: &str = "sfo::health";
/// Target used by the notification pipeline.
pub const TARGET_NOTIFY: &str = "sfo::notify";

/// Initialize a baseline tracing subscriber suitable for tests and local runs.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Resource kind (`database`, `cache`, ...).
    pub kind: Option<&'a str>,
    /// Named resource the event relates to.
    pub resource: Option<&'a str>,
    /// Role of the resource within its failover set.
    pub role: Option<&'a str>,
    /// One-based attempt number, when the event belongs to a retry loop.
    pub attempt: Option<u32>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a resource kind.
    pub fn with_kind(mut self, kind: &'a str) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach a resource name.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Attach the resource role.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach an attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation completed in a reduced mode.
    Degraded,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    /// Stable lowercase label for the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Degraded => "degraded",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event such as `failover.exhausted` or
/// `health.recovered`.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                target: "sfo::event",
                $level,
                event,
                outcome = outcome.as_str(),
                kind = ctx.kind.unwrap_or(""),
                resource = ctx.resource.unwrap_or(""),
                role = ctx.role.unwrap_or(""),
                attempt = ctx.attempt.unwrap_or_default(),
                message = %message
            )
        };
    }
    match outcome {
        SystemEventOutcome::Success => emit!(Level::INFO),
        SystemEventOutcome::Degraded => emit!(Level::WARN),
        SystemEventOutcome::Fault => emit!(Level::ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_kind("database")
            .with_resource("mysql")
            .with_role("primary")
            .with_attempt(2);
        sfo_info!(context = ctx.clone(), "attempt succeeded");
        sfo_debug!("debug message");
        sfo_warn!(target: TARGET_EXECUTOR, context = ctx.clone(), "retrying in {}ms", 50);
        sfo_error!(target: TARGET_HEALTH, context = ctx, "probe failed: {}", "refused");
        sfo_info!(target: TARGET_NOTIFY, "alert dispatched");
    }

    #[test]
    fn init_does_not_panic() {
        init();
        init();
    }

    #[test]
    fn system_event_helper_emits_for_every_outcome() {
        init();
        let ctx = LogContext::new().with_kind("queue");
        for outcome in [
            SystemEventOutcome::Success,
            SystemEventOutcome::Degraded,
            SystemEventOutcome::Fault,
        ] {
            log_system_event(Some(&ctx), "test.event", "helper executed", outcome);
        }
        log_system_event(None, "test.event", "no context", SystemEventOutcome::Fault);
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(SystemEventOutcome::Degraded.as_str(), "degraded");
        assert_eq!(SystemEventOutcome::Fault.as_str(), "fault");
    }
}
