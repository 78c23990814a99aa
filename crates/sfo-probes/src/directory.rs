//! ---
//! sfo_section: "04-integrations"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Concrete probes and capabilities for configured resources."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::Path;

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use sfo_common::{AppConfig, ResourceEndpoint, ResourceKind};
use sfo_core::ResourceRef;

/// Where each configured resource lives.
#[derive(Debug, Clone, Default)]
pub struct ResourceDirectory {
    entries: IndexMap<ResourceKind, IndexMap<String, ResourceEndpoint>>,
}

impl ResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut directory = Self::new();
        for (kind, entries) in &config.resources {
            for (name, endpoint) in entries {
                directory.insert(*kind, name.trim(), endpoint.clone());
            }
        }
        directory
    }

    pub fn insert(&mut self, kind: ResourceKind, name: &str, endpoint: ResourceEndpoint) {
        self.entries
            .entry(kind)
            .or_default()
            .insert(name.to_owned(), endpoint);
        self.entries.sort_keys();
    }

    pub fn with_endpoint(mut self, kind: ResourceKind, name: &str, address: &str) -> Self {
        self.insert(
            kind,
            name,
            ResourceEndpoint {
                endpoint: Some(address.to_owned()),
                path: None,
            },
        );
        self
    }

    pub fn with_path(mut self, kind: ResourceKind, name: &str, path: impl AsRef<Path>) -> Self {
        self.insert(
            kind,
            name,
            ResourceEndpoint {
                endpoint: None,
                path: Some(path.as_ref().to_path_buf()),
            },
        );
        self
    }

    pub fn lookup(&self, resource: &ResourceRef) -> Result<&ResourceEndpoint> {
        self.entries
            .get(&resource.kind())
            .and_then(|entries| entries.get(resource.name()))
            .ok_or_else(|| anyhow!("no endpoint configured for {}", resource))
    }

    /// `host:port` of a network resource.
    pub fn address(&self, resource: &ResourceRef) -> Result<&str> {
        self.lookup(resource)?
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("{} has no network endpoint", resource))
    }

    /// Directory of a storage volume.
    pub fn path(&self, resource: &ResourceRef) -> Result<&Path> {
        self.lookup(resource)?
            .path
            .as_deref()
            .ok_or_else(|| anyhow!("{} has no filesystem path", resource))
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.entries.keys().copied().collect()
    }

    /// Every configured resource of `kind`, in declaration order.
    pub fn resources(&self, kind: ResourceKind) -> Vec<ResourceRef> {
        self.entries
            .get(&kind)
            .map(|entries| {
                entries
                    .keys()
                    .filter_map(|name| ResourceRef::new(kind, name.as_str()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(IndexMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_resources_table() {
        let config: AppConfig = r#"
            [resources.storage.local]
            path = "/srv/data"

            [resources.database.mysql]
            endpoint = "10.0.0.5:3306"

            [resources.database.backup]
            endpoint = "10.0.0.6:3306"
        "#
        .parse()
        .unwrap();

        let directory = ResourceDirectory::from_config(&config);
        assert_eq!(
            directory.kinds(),
            vec![ResourceKind::Database, ResourceKind::Storage]
        );
        let names: Vec<_> = directory
            .resources(ResourceKind::Database)
            .iter()
            .map(|resource| resource.name().to_owned())
            .collect();
        assert_eq!(names, vec!["mysql", "backup"]);

        let mysql = ResourceRef::new(ResourceKind::Database, "mysql").unwrap();
        assert_eq!(directory.address(&mysql).unwrap(), "10.0.0.5:3306");
        assert!(directory.path(&mysql).is_err());

        let local = ResourceRef::new(ResourceKind::Storage, "local").unwrap();
        assert_eq!(directory.path(&local).unwrap(), Path::new("/srv/data"));
    }

    #[test]
    fn unknown_resources_are_errors() {
        let directory = ResourceDirectory::new();
        assert!(directory.is_empty());
        let redis = ResourceRef::new(ResourceKind::Cache, "redis").unwrap();
        let err = directory.lookup(&redis).unwrap_err();
        assert_eq!(err.to_string(), "no endpoint configured for cache:redis");
        assert!(directory.resources(ResourceKind::Cache).is_empty());
    }
}
