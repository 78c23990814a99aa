//! ---
//! sfo_section: "04-integrations"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Concrete probes and capabilities for configured resources."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sfo_core::{HealthProbe, ResourceCapability, ResourceRef};
use sfo_logging::{sfo_debug, LogContext, TARGET_HEALTH};
use tokio::net::TcpStream;

use crate::directory::ResourceDirectory;

async fn connect(directory: &ResourceDirectory, resource: &ResourceRef) -> Result<TcpStream> {
    let address = directory.address(resource)?;
    let stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("cannot connect to {} at {}", resource, address))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Connect round trip against a `host:port` endpoint.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    directory: Arc<ResourceDirectory>,
}

impl TcpProbe {
    pub fn new(directory: Arc<ResourceDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn round_trip(&self, resource: &ResourceRef) -> Result<()> {
        let stream = connect(&self.directory, resource).await?;
        let peer = stream.peer_addr()?;
        sfo_debug!(
            target: TARGET_HEALTH,
            context = LogContext::new()
                .with_kind(resource.kind().as_str())
                .with_resource(resource.name()),
            "connected to {}",
            peer
        );
        Ok(())
    }
}

/// Opens a fresh connection per attempt.
#[derive(Debug, Clone)]
pub struct TcpCapability {
    directory: Arc<ResourceDirectory>,
}

impl TcpCapability {
    pub fn new(directory: Arc<ResourceDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ResourceCapability for TcpCapability {
    type Handle = TcpStream;

    async fn resolve(&self, resource: &ResourceRef) -> Result<TcpStream> {
        connect(&self.directory, resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfo_common::ResourceKind;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_listener_and_fails_when_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let directory = Arc::new(
            ResourceDirectory::new().with_endpoint(ResourceKind::Cache, "redis", &address),
        );
        let redis = ResourceRef::new(ResourceKind::Cache, "redis").unwrap();
        let probe = TcpProbe::new(directory.clone());

        let result = probe.probe(&redis).await;
        assert!(result.healthy, "{:?}", result.error);

        drop(listener);
        let result = probe.probe(&redis).await;
        assert!(!result.healthy);
        assert!(result
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("cannot connect to cache:redis"));
    }

    #[tokio::test]
    async fn capability_requires_a_network_endpoint() {
        let directory =
            Arc::new(ResourceDirectory::new().with_path(ResourceKind::Storage, "local", "/tmp"));
        let local = ResourceRef::new(ResourceKind::Storage, "local").unwrap();
        let err = TcpCapability::new(directory).resolve(&local).await.unwrap_err();
        assert_eq!(err.to_string(), "storage:local has no network endpoint");
    }
}
