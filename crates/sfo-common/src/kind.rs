//! ---
//! sfo_section: "01-core-functionality"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Shared primitives and utilities for the failover runtime."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of backing resource protected by failover.
///
/// The declaration order is the canonical reporting order.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Cache,
    Queue,
    Mail,
    Storage,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Database,
        ResourceKind::Cache,
        ResourceKind::Queue,
        ResourceKind::Mail,
        ResourceKind::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Database => "database",
            ResourceKind::Cache => "cache",
            ResourceKind::Queue => "queue",
            ResourceKind::Mail => "mail",
            ResourceKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "database" | "db" => Ok(ResourceKind::Database),
            "cache" => Ok(ResourceKind::Cache),
            "queue" => Ok(ResourceKind::Queue),
            "mail" => Ok(ResourceKind::Mail),
            "storage" => Ok(ResourceKind::Storage),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}
