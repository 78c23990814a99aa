//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::ResourceRef;

/// Resolves a usable handle for a named resource.
///
/// Resolution failures are treated like any other retryable attempt failure.
#[async_trait]
pub trait ResourceCapability: Send + Sync {
    type Handle: Send;

    async fn resolve(&self, resource: &ResourceRef) -> anyhow::Result<Self::Handle>;
}

#[async_trait]
impl<C> ResourceCapability for Arc<C>
where
    C: ResourceCapability,
{
    type Handle = C::Handle;

    async fn resolve(&self, resource: &ResourceRef) -> anyhow::Result<Self::Handle> {
        self.as_ref().resolve(resource).await
    }
}

/// Hands the resource reference itself to the operation. Useful when the caller
/// already owns its connections and only needs to know which one to use.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCapability;

#[async_trait]
impl ResourceCapability for PassthroughCapability {
    type Handle = ResourceRef;

    async fn resolve(&self, resource: &ResourceRef) -> anyhow::Result<ResourceRef> {
        Ok(resource.clone())
    }
}
