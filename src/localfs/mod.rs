//! Local persistence of packaged artifacts between packaging and upload.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

#[async_trait]
pub trait LocalFs: Send + Sync {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    async fn delete(&self, path: &Path) -> Result<()>;
}

/// [`LocalFs`] on the real disk.
#[derive(Debug, Default, Clone)]
pub struct DiskFs;

impl DiskFs {
    pub fn new() -> Self {
        DiskFs
    }
}

#[async_trait]
impl LocalFs for DiskFs {
    /// Write `bytes`, creating missing parent directories first.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context(format!("Failed to create directory {}", parent.display()))?;
            }
        }
        tokio::fs::write(path, bytes)
            .await
            .context(format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .context(format!("Failed to read {}", path.display()))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .context(format!("Failed to delete {}", path.display()))
    }
}
