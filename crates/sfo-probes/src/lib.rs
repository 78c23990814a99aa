//! ---
//! sfo_section: "04-integrations"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Concrete probes and capabilities for configured resources."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Concrete glue between configured resource endpoints and the failover core.
//!
//! Network-backed kinds (database, cache, queue, mail) are probed with a TCP
//! connect round trip; storage volumes with a marker file written and read back.

pub mod directory;
pub mod fs;
pub mod tcp;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use sfo_common::ResourceKind;
use sfo_core::{HealthAggregator, ResourceCapability, ResourceRef, SharedProbe};
use tokio::net::TcpStream;

pub use directory::ResourceDirectory;
pub use fs::{DirectoryCapability, FilesystemProbe};
pub use tcp::{TcpCapability, TcpProbe};

/// Probe used for each kind present in the directory.
pub fn probes_for(directory: &Arc<ResourceDirectory>) -> IndexMap<ResourceKind, SharedProbe> {
    directory
        .kinds()
        .into_iter()
        .map(|kind| (kind, probe_for_kind(kind, directory.clone())))
        .collect()
}

pub fn probe_for_kind(kind: ResourceKind, directory: Arc<ResourceDirectory>) -> SharedProbe {
    match kind {
        ResourceKind::Storage => Arc::new(FilesystemProbe::new(directory)),
        ResourceKind::Database | ResourceKind::Cache | ResourceKind::Queue | ResourceKind::Mail => {
            Arc::new(TcpProbe::new(directory))
        }
    }
}

/// Register the directory's probes and every resource it lists.
pub fn register_directory(aggregator: &mut HealthAggregator, directory: &Arc<ResourceDirectory>) {
    for (kind, probe) in probes_for(directory) {
        aggregator.register_probe(kind, probe);
        for resource in directory.resources(kind) {
            aggregator.register_resource(resource);
        }
    }
}

/// Handle for whichever kind of resource was resolved.
#[derive(Debug)]
pub enum Connection {
    Stream(TcpStream),
    Directory(PathBuf),
}

/// Picks the TCP or directory capability by resource kind.
#[derive(Debug, Clone)]
pub struct EndpointCapability {
    tcp: TcpCapability,
    dir: DirectoryCapability,
}

impl EndpointCapability {
    pub fn new(directory: Arc<ResourceDirectory>) -> Self {
        Self {
            tcp: TcpCapability::new(directory.clone()),
            dir: DirectoryCapability::new(directory),
        }
    }
}

#[async_trait]
impl ResourceCapability for EndpointCapability {
    type Handle = Connection;

    async fn resolve(&self, resource: &ResourceRef) -> Result<Connection> {
        match resource.kind() {
            ResourceKind::Storage => self.dir.resolve(resource).await.map(Connection::Directory),
            _ => self.tcp.resolve(resource).await.map(Connection::Stream),
        }
    }
}
