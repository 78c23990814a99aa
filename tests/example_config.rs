//! ---
//! sfo_section: "15-testing-qa-runbook"
//! sfo_subsection: "integration-tests"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Integration and validation tests for the smart failover stack."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::Duration;

use sfo_common::{AppConfig, ResourceKind};
use sfo_core::FailoverRoutes;
use sfo_probes::ResourceDirectory;

fn example_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/sfo.example.toml")
}

#[test]
fn example_config_loads_and_validates() {
    let config = AppConfig::from_path(&example_path())
        .unwrap_or_else(|err| panic!("example config should load: {err:#}"));
    assert_eq!(
        config.enabled_kinds(),
        vec![
            ResourceKind::Database,
            ResourceKind::Cache,
            ResourceKind::Queue,
            ResourceKind::Storage
        ]
    );
    assert_eq!(config.health_check.route_path, "/health/smart-failover");
}

#[test]
fn example_routes_resolve_kind_defaults() {
    let config = AppConfig::from_path(&example_path()).unwrap();
    let routes = FailoverRoutes::from_config(&config).unwrap();

    let queue = routes.route(ResourceKind::Queue).unwrap();
    assert!(queue.policy.retry.exponential_backoff());
    assert_eq!(queue.policy.retry.base_delay(), Duration::from_millis(2000));
    assert!(!queue.policy.graceful_degradation);
    assert_eq!(queue.health_check_interval, Duration::from_secs(60));

    let cache = routes.route(ResourceKind::Cache).unwrap();
    assert_eq!(cache.policy.retry.max_attempts(), 2);
    assert!(cache.policy.graceful_degradation);

    assert!(routes.route(ResourceKind::Storage).unwrap().policy.prefer_healthy);
    assert!(routes.route(ResourceKind::Mail).is_err());
}

#[test]
fn every_route_member_has_an_endpoint() {
    let config = AppConfig::from_path(&example_path()).unwrap();
    let directory = ResourceDirectory::from_config(&config);
    let routes = FailoverRoutes::from_config(&config).unwrap();
    for set in routes.sets() {
        for (_, resource) in set.members() {
            assert!(
                directory.lookup(resource).is_ok(),
                "{resource} is routed but has no resources entry"
            );
        }
    }
}
