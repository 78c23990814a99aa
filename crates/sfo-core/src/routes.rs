//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::time::Duration;

use indexmap::IndexMap;
use sfo_common::{AppConfig, FailoverSettings, ResourceKind};

use crate::error::FailoverError;
use crate::executor::FailoverPolicy;
use crate::model::FailoverSet;

/// Failover set and policy configured for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverRoute {
    pub set: FailoverSet,
    pub policy: FailoverPolicy,
    pub health_check_interval: Duration,
}

impl FailoverRoute {
    pub fn from_settings(settings: &FailoverSettings) -> Result<Self, FailoverError> {
        Ok(Self {
            set: FailoverSet::from_settings(settings)?,
            policy: FailoverPolicy::from(settings),
            health_check_interval: settings.health_check_interval,
        })
    }
}

/// Routes for every enabled kind, in canonical kind order.
#[derive(Debug, Clone, Default)]
pub struct FailoverRoutes {
    routes: IndexMap<ResourceKind, FailoverRoute>,
}

impl FailoverRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FailoverError> {
        let mut routes = Self::new();
        for kind in config.enabled_kinds() {
            if let Some(settings) = config.failover_settings(kind) {
                routes.insert(FailoverRoute::from_settings(&settings)?);
            }
        }
        Ok(routes)
    }

    /// Add or replace the route for the set's kind.
    pub fn insert(&mut self, route: FailoverRoute) -> Option<FailoverRoute> {
        let previous = self.routes.insert(route.set.kind(), route);
        self.routes.sort_keys();
        previous
    }

    pub fn route(&self, kind: ResourceKind) -> Result<&FailoverRoute, FailoverError> {
        self.routes.get(&kind).ok_or_else(|| {
            FailoverError::Configuration(format!("no failover route configured for kind {}", kind))
        })
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.routes.keys().copied().collect()
    }

    pub fn sets(&self) -> impl Iterator<Item = &FailoverSet> {
        self.routes.values().map(|route| &route.set)
    }

    /// Sweep period per monitored kind: the route's `health_check_interval` when
    /// the kind is routed, `default` otherwise.
    pub fn sweep_schedule(
        &self,
        kinds: &[ResourceKind],
        default: Duration,
    ) -> IndexMap<ResourceKind, Duration> {
        let mut schedule: IndexMap<ResourceKind, Duration> = kinds
            .iter()
            .map(|kind| {
                let period = self
                    .routes
                    .get(kind)
                    .map_or(default, |route| route.health_check_interval);
                (*kind, period)
            })
            .collect();
        schedule.sort_keys();
        schedule
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_routes_for_enabled_kinds() {
        let config: AppConfig = r#"
            [failover.storage]
            primary = "s3"
            fallback = "local"

            [failover.database]
            primary = "mysql"
            fallback = "backup"
            prefer_healthy = true

            [failover.mail]
            enabled = false
        "#
        .parse()
        .unwrap();

        let routes = FailoverRoutes::from_config(&config).unwrap();
        assert_eq!(
            routes.kinds(),
            vec![ResourceKind::Database, ResourceKind::Storage]
        );

        let database = routes.route(ResourceKind::Database).unwrap();
        assert!(database.policy.graceful_degradation);
        assert!(database.policy.prefer_healthy);
        assert_eq!(database.policy.retry.max_attempts(), 3);
        assert_eq!(database.set.fallback().map(|r| r.name()), Some("backup"));

        let storage = routes.route(ResourceKind::Storage).unwrap();
        assert!(!storage.policy.graceful_degradation);
        assert_eq!(routes.sets().count(), 2);
    }

    #[test]
    fn sweep_schedule_uses_route_intervals() {
        let config: AppConfig = r#"
            [failover.queue]
            primary = "redis"

            [failover.database]
            primary = "mysql"
            health_check_interval = 15
        "#
        .parse()
        .unwrap();
        let routes = FailoverRoutes::from_config(&config).unwrap();

        let schedule = routes.sweep_schedule(
            &[ResourceKind::Storage, ResourceKind::Queue, ResourceKind::Database],
            Duration::from_secs(45),
        );
        assert_eq!(
            schedule.into_iter().collect::<Vec<_>>(),
            vec![
                (ResourceKind::Database, Duration::from_secs(15)),
                (ResourceKind::Queue, Duration::from_secs(60)),
                (ResourceKind::Storage, Duration::from_secs(45)),
            ]
        );
    }

    #[test]
    fn unrouted_kind_is_a_configuration_error() {
        let routes = FailoverRoutes::new();
        let err = routes.route(ResourceKind::Queue).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no failover route configured for kind queue"));
    }
}
