//! ---
//! sfo_section: "05-networking-external-interfaces"
//! sfo_subsection: "binary"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Control CLI for operators inspecting smart failover."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::Args;
use sfo_common::ResourceKind;
use sfo_core::{
    Execution, FailoverExecutor, FailoverRoutes, HealthRegistry, InMemoryExpiringStore, Notifier,
    OperationError, ResourceCapability, ResourceRef, TracingDispatcher,
};
use sfo_logging::{log_system_event, SystemEventOutcome};
use sfo_probes::{Connection, EndpointCapability, ResourceDirectory};
use tokio::runtime::Runtime;

#[derive(Debug, Args)]
pub struct TestFailoverArgs {
    /// Resource kind whose route is exercised.
    #[arg(value_name = "KIND")]
    kind: ResourceKind,

    /// Make every attempt against the primary fail to force a fallback.
    #[arg(long)]
    simulate_failure: bool,
}

/// Capability wrapper that refuses to resolve one resource.
struct SimulatedOutage<C> {
    inner: C,
    down: Option<ResourceRef>,
}

#[async_trait]
impl<C: ResourceCapability> ResourceCapability for SimulatedOutage<C> {
    type Handle = C::Handle;

    async fn resolve(&self, resource: &ResourceRef) -> Result<C::Handle> {
        if self.down.as_ref() == Some(resource) {
            return Err(anyhow!("simulated outage of {}", resource));
        }
        self.inner.resolve(resource).await
    }
}

fn describe(connection: Connection) -> Result<String, OperationError> {
    match connection {
        Connection::Stream(stream) => stream
            .peer_addr()
            .map(|addr| format!("connected to {}", addr))
            .map_err(OperationError::retryable),
        Connection::Directory(path) => Ok(format!("writable directory {}", path.display())),
    }
}

/// Run the configured route once; exit 0 when served, 1 when degraded.
pub fn run(config_path: Option<&PathBuf>, args: TestFailoverArgs) -> Result<ExitCode> {
    let config = crate::load_config(config_path)?;
    let routes = FailoverRoutes::from_config(&config)?;
    let route = routes.route(args.kind)?;
    let directory = Arc::new(ResourceDirectory::from_config(&config));

    let capability = SimulatedOutage {
        inner: EndpointCapability::new(directory),
        down: args.simulate_failure.then(|| route.set.primary().clone()),
    };
    let notifier = Notifier::from_config(
        &config.notifications,
        Arc::new(InMemoryExpiringStore::new()),
        Arc::new(TracingDispatcher),
    );
    let executor = FailoverExecutor::new(
        capability,
        Arc::new(HealthRegistry::new(config.health_check.cooldown)),
    )
    .with_notifier(Arc::new(notifier));

    println!("Failover drill for {}", args.kind);
    println!("  primary:  {}", route.set.primary().name());
    println!(
        "  fallback: {}",
        route.set.fallback().map(|r| r.name()).unwrap_or("(none)")
    );
    if args.simulate_failure {
        println!("  simulating failure of {}", route.set.primary().name());
    }

    let runtime = Runtime::new()?;
    let started = Instant::now();
    let execution = runtime.block_on(executor.execute(&route.set, &route.policy, |connection| async move {
        describe(connection)
    }))?;
    let elapsed = started.elapsed();

    for record in executor.registry().get_all(args.kind) {
        println!(
            "  {:<20} {}{}",
            record.resource.name(),
            record.status.as_str(),
            record
                .last_error
                .as_deref()
                .map(|error| format!(" ({})", error))
                .unwrap_or_default()
        );
    }

    match execution {
        Execution::Completed {
            value,
            served_by,
            role,
            attempts,
        } => {
            println!(
                "Served by {} ({}) after {} attempt(s) in {:.2?}: {}",
                served_by.name(),
                role.as_str(),
                attempts,
                elapsed,
                value
            );
            log_system_event(
                None,
                "failover.drill",
                &format!("{} drill served by {}", args.kind, served_by),
                SystemEventOutcome::Success,
            );
            Ok(ExitCode::SUCCESS)
        }
        Execution::Degraded { last_error, .. } => {
            println!("Degraded after {:.2?}: {}", elapsed, last_error);
            log_system_event(
                None,
                "failover.drill",
                &format!("{} drill degraded: {}", args.kind, last_error),
                SystemEventOutcome::Degraded,
            );
            Ok(ExitCode::from(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfo_core::PassthroughCapability;

    #[tokio::test]
    async fn simulated_outage_only_blocks_the_target() {
        let mysql = ResourceRef::new(ResourceKind::Database, "mysql").unwrap();
        let backup = ResourceRef::new(ResourceKind::Database, "backup").unwrap();
        let capability = SimulatedOutage {
            inner: PassthroughCapability,
            down: Some(mysql.clone()),
        };
        let err = capability.resolve(&mysql).await.unwrap_err();
        assert_eq!(err.to_string(), "simulated outage of database:mysql");
        assert_eq!(capability.resolve(&backup).await.unwrap(), backup);
    }
}
