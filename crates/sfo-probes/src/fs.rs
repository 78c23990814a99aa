//! ---
//! sfo_section: "04-integrations"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Concrete probes and capabilities for configured resources."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sfo_core::{HealthProbe, ResourceCapability, ResourceRef};
use tokio::fs;

use crate::directory::ResourceDirectory;

const MARKER_PREFIX: &str = ".sfo_health_check";

async fn ensure_writable_dir(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path)
        .await
        .with_context(|| format!("cannot stat {}", path.display()))?;
    if !metadata.is_dir() {
        bail!("{} is not a directory", path.display());
    }
    if metadata.permissions().readonly() {
        bail!("{} is read-only", path.display());
    }
    Ok(())
}

/// Writes, reads back and deletes a marker file under the volume path.
#[derive(Debug, Clone)]
pub struct FilesystemProbe {
    directory: Arc<ResourceDirectory>,
}

impl FilesystemProbe {
    pub fn new(directory: Arc<ResourceDirectory>) -> Self {
        Self { directory }
    }

    fn marker_path(root: &Path) -> (PathBuf, String) {
        let stamp = Utc::now();
        let name = format!(
            "{}_{}_{}",
            MARKER_PREFIX,
            std::process::id(),
            stamp.timestamp_nanos_opt().unwrap_or_default()
        );
        (root.join(name), stamp.to_rfc3339())
    }
}

#[async_trait]
impl HealthProbe for FilesystemProbe {
    async fn round_trip(&self, resource: &ResourceRef) -> Result<()> {
        let root = self.directory.path(resource)?;
        ensure_writable_dir(root).await?;

        let (marker, content) = Self::marker_path(root);
        fs::write(&marker, content.as_bytes())
            .await
            .with_context(|| format!("cannot write {}", marker.display()))?;
        let read_back = fs::read_to_string(&marker).await;
        let removed = fs::remove_file(&marker).await;

        let read_back = read_back.with_context(|| format!("cannot read {}", marker.display()))?;
        if read_back != content {
            return Err(anyhow!(
                "marker content mismatch in {}",
                root.display()
            ));
        }
        removed.with_context(|| format!("cannot delete {}", marker.display()))?;
        Ok(())
    }
}

/// Resolves a storage resource to its verified, writable directory.
#[derive(Debug, Clone)]
pub struct DirectoryCapability {
    directory: Arc<ResourceDirectory>,
}

impl DirectoryCapability {
    pub fn new(directory: Arc<ResourceDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ResourceCapability for DirectoryCapability {
    type Handle = PathBuf;

    async fn resolve(&self, resource: &ResourceRef) -> Result<PathBuf> {
        let root = self.directory.path(resource)?;
        ensure_writable_dir(root).await?;
        Ok(root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfo_common::ResourceKind;
    use tempfile::tempdir;

    fn storage(name: &str) -> ResourceRef {
        ResourceRef::new(ResourceKind::Storage, name).unwrap()
    }

    #[tokio::test]
    async fn probe_leaves_no_marker_behind() {
        let dir = tempdir().unwrap();
        let directory =
            Arc::new(ResourceDirectory::new().with_path(ResourceKind::Storage, "local", dir.path()));

        let result = FilesystemProbe::new(directory).probe(&storage("local")).await;
        assert!(result.healthy, "{:?}", result.error);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_directory_is_unhealthy() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        let directory =
            Arc::new(ResourceDirectory::new().with_path(ResourceKind::Storage, "local", &gone));

        let result = FilesystemProbe::new(directory.clone())
            .probe(&storage("local"))
            .await;
        assert!(!result.healthy);
        assert!(result.error.unwrap_or_default().starts_with("cannot stat"));

        let err = DirectoryCapability::new(directory)
            .resolve(&storage("local"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("cannot stat"));
    }

    #[tokio::test]
    async fn capability_rejects_plain_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("volume");
        std::fs::write(&file, b"x").unwrap();
        let directory = Arc::new(
            ResourceDirectory::new()
                .with_path(ResourceKind::Storage, "file", &file)
                .with_path(ResourceKind::Storage, "dir", dir.path()),
        );
        let capability = DirectoryCapability::new(directory);

        let err = capability.resolve(&storage("file")).await.unwrap_err();
        assert!(err.to_string().ends_with("is not a directory"));
        assert_eq!(
            capability.resolve(&storage("dir")).await.unwrap(),
            dir.path()
        );
    }
}
