//! ---
//! sfo_section: "02-failover-engine"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Failover execution core and health tracking."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use sfo_common::ResourceKind;
use thiserror::Error;

use crate::model::ResourceRef;

/// Failure reported by a caller-supplied operation.
///
/// Plain `anyhow` errors convert into [`OperationError::Retryable`], so `?` inside an
/// operation retries by default. Wrap an error with [`OperationError::fatal`] to stop
/// the executor immediately.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0:#}")]
    Retryable(anyhow::Error),
    #[error("{0:#}")]
    Fatal(anyhow::Error),
}

impl OperationError {
    pub fn retryable(err: impl Into<anyhow::Error>) -> Self {
        OperationError::Retryable(err.into())
    }

    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        OperationError::Fatal(err.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, OperationError::Fatal(_))
    }

    pub fn into_inner(self) -> anyhow::Error {
        match self {
            OperationError::Retryable(err) | OperationError::Fatal(err) => err,
        }
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        OperationError::Retryable(err)
    }
}

/// Terminal error surfaced by the failover executor.
#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("non-retryable failure on {resource}: {source:#}")]
    Fatal {
        resource: ResourceRef,
        #[source]
        source: anyhow::Error,
    },
    #[error("all {kind} resources exhausted; {resource} failed {attempts} attempts: {source:#}")]
    Exhausted {
        kind: ResourceKind,
        resource: ResourceRef,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl FailoverError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, FailoverError::Configuration(_))
    }

    /// Resource whose error terminated execution, if any.
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            FailoverError::Configuration(_) => None,
            FailoverError::Fatal { resource, .. } | FailoverError::Exhausted { resource, .. } => {
                Some(resource)
            }
        }
    }
}
