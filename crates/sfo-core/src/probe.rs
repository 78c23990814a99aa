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
use tokio::time::Instant;

use crate::model::{ProbeResult, ResourceRef};

/// Cheap round trip against one resource of a kind.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn round_trip(&self, resource: &ResourceRef) -> anyhow::Result<()>;

    /// Time the round trip and convert its outcome into a [`ProbeResult`].
    async fn probe(&self, resource: &ResourceRef) -> ProbeResult {
        let started = Instant::now();
        match self.round_trip(resource).await {
            Ok(()) => ProbeResult::healthy(resource.clone(), started.elapsed()),
            Err(err) => {
                ProbeResult::unhealthy(resource.clone(), started.elapsed(), format!("{:#}", err))
            }
        }
    }
}

pub type SharedProbe = Arc<dyn HealthProbe>;
