//! ---
//! sfo_section: "04-integrations"
//! sfo_subsection: "test"
//! sfo_type: "source"
//! sfo_scope: "test"
//! sfo_description: "Probes and capabilities against live local endpoints."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use sfo_common::{AppConfig, ResourceKind};
use sfo_core::{
    FailoverExecutor, FailoverRoutes, HealthAggregator, HealthRegistry, HealthStatus,
    OperationError, OverallStatus, ResourceRef, ResourceRole,
};
use sfo_probes::{register_directory, Connection, EndpointCapability, ResourceDirectory};
use tempfile::tempdir;
use tokio::net::TcpListener;

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

#[tokio::test]
async fn aggregator_reports_degraded_when_one_endpoint_is_down() {
    let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_addr = live.local_addr().unwrap().to_string();
    let dead_addr = closed_port().await;
    let volume = tempdir().unwrap();

    let directory = Arc::new(
        ResourceDirectory::new()
            .with_endpoint(ResourceKind::Database, "mysql", &dead_addr)
            .with_endpoint(ResourceKind::Database, "backup", &live_addr)
            .with_path(ResourceKind::Storage, "local", volume.path()),
    );
    let mut aggregator =
        HealthAggregator::new(Arc::new(HealthRegistry::default()), Duration::from_secs(2));
    register_directory(&mut aggregator, &directory);

    let report = aggregator
        .check_all(&[ResourceKind::Database, ResourceKind::Storage])
        .await;
    assert_eq!(report.overall_status, OverallStatus::Degraded);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.healthy, 2);

    let mysql = ResourceRef::new(ResourceKind::Database, "mysql").unwrap();
    assert_eq!(aggregator.registry().get(&mysql).status, HealthStatus::Unhealthy);
    assert!(aggregator.is_service_healthy(ResourceKind::Storage));
}

#[tokio::test]
async fn executor_falls_back_to_reachable_endpoint() {
    let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config: AppConfig = format!(
        r#"
        [failover.cache]
        primary = "redis"
        fallback = "redis_replica"
        retry_attempts = 2
        retry_delay_ms = 10

        [resources.cache.redis]
        endpoint = "{}"

        [resources.cache.redis_replica]
        endpoint = "{}"
        "#,
        closed_port().await,
        live.local_addr().unwrap()
    )
    .parse()
    .unwrap();

    let directory = Arc::new(ResourceDirectory::from_config(&config));
    let routes = FailoverRoutes::from_config(&config).unwrap();
    let executor = FailoverExecutor::new(
        EndpointCapability::new(directory),
        Arc::new(HealthRegistry::default()),
    );

    let execution = executor
        .execute_route(&routes, ResourceKind::Cache, |connection: Connection| async move {
            match connection {
                Connection::Stream(stream) => stream.peer_addr().map_err(OperationError::retryable),
                Connection::Directory(path) => Err(OperationError::fatal(anyhow::anyhow!(
                    "unexpected directory {}",
                    path.display()
                ))),
            }
        })
        .await
        .unwrap();

    assert_eq!(execution.served_by().map(|r| r.name()), Some("redis_replica"));
    assert_eq!(execution.value().copied(), Some(live.local_addr().unwrap()));
    match execution {
        sfo_core::Execution::Completed { role, attempts, .. } => {
            assert_eq!(role, ResourceRole::Fallback);
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
